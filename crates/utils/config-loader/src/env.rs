use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Env {
    #[serde(rename = "dev")]
    Development,
    Staging,
    Production,
    Unknown(String),
}

impl Env {
    pub fn is_production(&self) -> bool {
        matches!(self, Env::Production)
    }
}

impl From<String> for Env {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "development" | "dev" | "sit" => Env::Development,
            "staging" | "stg" => Env::Staging,
            "production" | "prod" => Env::Production,
            other => Env::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_aliases() {
        assert_eq!(Env::from("SIT".to_string()), Env::Development);
        assert_eq!(Env::from("stg".to_string()), Env::Staging);
        assert!(Env::from("Production".to_string()).is_production());
        assert_eq!(
            Env::from("qa".to_string()),
            Env::Unknown("qa".to_string())
        );
    }
}
