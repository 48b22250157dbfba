//! Team roster and role management for sign-off authorization
//!
//! The roster lives in `.qct/team.yaml`. When no roster exists, role-based
//! approval steps accept any signer.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::config::{read_yaml, ConfigError};
use crate::core::Project;

/// Team roles for authorization
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Engineering,
    #[value(alias = "qa")]
    #[serde(alias = "qa")]
    Quality,
    Manager,
    Director,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Engineering => write!(f, "engineering"),
            Role::Quality => write!(f, "quality"),
            Role::Manager => write!(f, "manager"),
            Role::Director => write!(f, "director"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "engineering" => Ok(Role::Engineering),
            "quality" | "qa" => Ok(Role::Quality),
            "manager" | "management" => Ok(Role::Manager),
            "director" => Ok(Role::Director),
            "admin" => Ok(Role::Admin),
            _ => Err(format!(
                "Unknown role: {}. Use engineering, quality (qa), manager, director, or admin",
                s
            )),
        }
    }
}

/// A team member with their roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Identity used when signing (matches the configured author)
    pub username: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    /// Check if member has a specific role
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Check if member is an admin (can sign any role-based step)
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    fn answers_to(&self, identity: &str) -> bool {
        self.username.eq_ignore_ascii_case(identity) || self.name.eq_ignore_ascii_case(identity)
    }
}

/// Team roster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRoster {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

fn default_version() -> u32 {
    1
}

impl Default for TeamRoster {
    fn default() -> Self {
        Self {
            version: 1,
            members: Vec::new(),
        }
    }
}

impl TeamRoster {
    /// Load team roster from the project's .qct/team.yaml
    pub fn load(project: &Project) -> Result<Option<Self>, ConfigError> {
        Self::load_from_path(&project.qct_dir().join("team.yaml"))
    }

    /// Load team roster from a specific path; `Ok(None)` when the file does
    /// not exist, an error when it exists but does not parse
    pub fn load_from_path(path: &Path) -> Result<Option<Self>, ConfigError> {
        read_yaml(path)
    }

    /// Save team roster to the project's .qct/team.yaml
    pub fn save(&self, project: &Project) -> std::io::Result<()> {
        self.save_to_path(&project.qct_dir().join("team.yaml"))
    }

    /// Save team roster to a specific path
    pub fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        let contents = serde_yml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    /// Find an active member by username or display name
    pub fn find_member(&self, identity: &str) -> Option<&TeamMember> {
        self.members
            .iter()
            .find(|m| m.active && m.answers_to(identity))
    }

    /// Whether `identity` may sign a step requiring `role`
    pub fn can_sign_as(&self, identity: &str, role: Role) -> bool {
        self.find_member(identity)
            .map(|m| m.is_admin() || m.has_role(role))
            .unwrap_or(false)
    }

    /// Add a member, replacing any existing entry with the same username
    pub fn add_member(&mut self, member: TeamMember) {
        self.members
            .retain(|m| !m.username.eq_ignore_ascii_case(&member.username));
        self.members.push(member);
    }

    /// Get all active members
    pub fn active_members(&self) -> impl Iterator<Item = &TeamMember> {
        self.members.iter().filter(|m| m.active)
    }

    /// Generate default team.yaml template content
    pub fn default_template() -> &'static str {
        r#"# QCT Team Roster
# Role-based approval steps are checked against this list.
# Without a roster, any signer may sign a role-based step.

version: 1

members:
  # - name: "Jane Smith"
  #   email: "jane@example.com"
  #   username: "jsmith"        # Matches the configured author / git user.name
  #   roles: [quality, manager]
  #   active: true
  []
# Role options: engineering, quality (qa), manager, director, admin
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn member(name: &str, username: &str, roles: Vec<Role>) -> TeamMember {
        TeamMember {
            name: name.to_string(),
            email: None,
            username: username.to_string(),
            roles,
            active: true,
        }
    }

    fn roster() -> TeamRoster {
        let mut roster = TeamRoster::default();
        roster.add_member(member("Quinn Auditor", "qa1", vec![Role::Quality]));
        roster.add_member(member("Morgan Lee", "mlee", vec![Role::Manager]));
        roster.add_member(member("Root", "root", vec![Role::Admin]));
        roster
    }

    #[test]
    fn test_role_parsing_accepts_aliases() {
        assert_eq!("QA".parse::<Role>().unwrap(), Role::Quality);
        assert_eq!("management".parse::<Role>().unwrap(), Role::Manager);
        assert!("ceo".parse::<Role>().is_err());
    }

    #[test]
    fn test_qa_alias_in_yaml() {
        let yaml = "members:\n  - name: A\n    username: a\n    roles: [qa]\n";
        let roster: TeamRoster = serde_yml::from_str(yaml).unwrap();
        assert!(roster.members[0].has_role(Role::Quality));
    }

    #[test]
    fn test_can_sign_as() {
        let roster = roster();
        assert!(roster.can_sign_as("qa1", Role::Quality));
        assert!(roster.can_sign_as("Quinn Auditor", Role::Quality));
        assert!(!roster.can_sign_as("mlee", Role::Quality));
        assert!(!roster.can_sign_as("stranger", Role::Quality));
    }

    #[test]
    fn test_admin_signs_any_role() {
        let roster = roster();
        assert!(roster.can_sign_as("root", Role::Director));
    }

    #[test]
    fn test_inactive_member_cannot_sign() {
        let mut roster = roster();
        roster.members[0].active = false;
        assert!(!roster.can_sign_as("qa1", Role::Quality));
    }

    #[test]
    fn test_add_member_replaces_same_username() {
        let mut roster = roster();
        roster.add_member(member("Quinn A.", "QA1", vec![Role::Director]));
        assert_eq!(roster.members.len(), 3);
        assert!(roster.can_sign_as("qa1", Role::Director));
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("team.yaml");

        roster().save_to_path(&path).unwrap();

        let loaded = TeamRoster::load_from_path(&path).unwrap().unwrap();
        assert_eq!(loaded.members.len(), 3);
        assert_eq!(loaded.active_members().count(), 3);
    }

    #[test]
    fn test_missing_roster_is_none() {
        let tmp = tempdir().unwrap();
        let loaded = TeamRoster::load_from_path(&tmp.path().join("team.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_unknown_role_in_roster_is_an_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("team.yaml");
        std::fs::write(
            &path,
            "members:\n  - name: Mal\n    username: mal\n    roles: [mangaer]\n",
        )
        .unwrap();

        let err = TeamRoster::load_from_path(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_template_parses() {
        let roster: TeamRoster = serde_yml::from_str(TeamRoster::default_template()).unwrap();
        assert!(roster.members.is_empty());
    }
}
