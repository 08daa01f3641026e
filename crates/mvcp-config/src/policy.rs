use std::path::Path;

use mvcp_domain::Policy;

use crate::error::ConfigError;

/// Load and validate a policy document from a YAML file.
pub fn load_policy(path: &Path) -> Result<Policy, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let policy: Policy = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    policy.validate()?;
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_policy_accepts_well_formed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yml");
        std::fs::write(
            &path,
            r#"
name: default
mode: enforce
rules:
  max_latency_ms: 200
  min_reputation_score: 0.5
scoring:
  latency_weight: 0.6
  reputation_weight: 0.4
"#,
        )
        .unwrap();
        let policy = load_policy(&path).unwrap();
        assert_eq!(policy.name, "default");
        assert_eq!(policy.rules.max_latency_ms, 200.0);
    }

    #[test]
    fn load_policy_rejects_negative_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yml");
        std::fs::write(
            &path,
            r#"
name: bad
mode: enforce
rules:
  max_latency_ms: -5
"#,
        )
        .unwrap();
        assert!(load_policy(&path).is_err());
    }

    #[test]
    fn load_policy_rejects_missing_file() {
        let path = Path::new("/nonexistent/policy.yml");
        assert!(matches!(load_policy(path), Err(ConfigError::Io { .. })));
    }
}
