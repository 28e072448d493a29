//! Push event domain types
//!
//! Only the fields of the source host's push payload that the controller and
//! worker act on are modeled. Every field defaults when absent and unknown
//! fields are ignored.

use serde::{Deserialize, Serialize};

/// A push notification from the source-code host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Full ref that was pushed (e.g. `refs/heads/master`)
    #[serde(rename = "ref", default)]
    pub git_ref: String,

    /// Commit the ref points at after the push
    #[serde(default)]
    pub after: String,

    #[serde(default)]
    pub repository: Repository,
}

impl PushEvent {
    /// Branch name of the pushed ref, if the ref is a branch
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}

/// Repository section of a push event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub url: String,
    pub git_url: String,
    pub ssh_url: String,
    pub default_branch: String,
    pub master_branch: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_github_push() {
        let body = r#"{
            "ref": "refs/heads/master",
            "after": "9f2c1e",
            "repository": {
                "name": "uyghurs",
                "url": "https://github.com/the-rileyj/uyghurs",
                "created_at": 1595113171,
                "pushed_at": 1595118640,
                "git_url": "git://github.com/the-rileyj/uyghurs.git",
                "ssh_url": "git@github.com:the-rileyj/uyghurs.git",
                "default_branch": "master",
                "master_branch": "master"
            }
        }"#;

        let push: PushEvent = serde_json::from_str(body).unwrap();
        assert_eq!(push.git_ref, "refs/heads/master");
        assert_eq!(push.after, "9f2c1e");
        assert_eq!(push.repository.name, "uyghurs");
        assert_eq!(push.repository.default_branch, "master");
        assert_eq!(push.branch(), Some("master"));
    }

    #[test]
    fn test_decode_minimal_push() {
        let push: PushEvent =
            serde_json::from_str(r#"{"ref":"refs/heads/master","repository":{"name":"demo"}}"#)
                .unwrap();

        assert_eq!(push.repository.name, "demo");
        assert!(push.after.is_empty());
        assert!(push.repository.ssh_url.is_empty());
    }

    #[test]
    fn test_tag_ref_has_no_branch() {
        let push = PushEvent {
            git_ref: "refs/tags/v1.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(push.branch(), None);
    }
}
