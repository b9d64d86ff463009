use serde::{Deserialize, Serialize};

/// An authorization predicate evaluated by the proxy's authentication modules. A target lists
/// the conditions a user may satisfy to be granted access.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    GithubAllowedOrganizations(Vec<String>),
    GithubAllowedTeams(Vec<String>),
    GithubAllowedUsers(Vec<String>),
    EmailDomains(Vec<String>),
    AllowedEmails(Vec<String>),
}

/// Condition fields as authored on a service or in a targets file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConditions {
    pub github_allowed_organizations: Option<Vec<String>>,
    pub github_allowed_teams: Option<Vec<String>>,
    pub github_allowed_users: Option<Vec<String>>,
    pub email_domains: Option<Vec<String>>,
    pub allowed_emails: Option<Vec<String>>,
}

// === impl RawConditions ===

impl RawConditions {
    /// Builds the condition list for a target.
    ///
    /// When any GitHub field is set, exactly those conditions are returned. Otherwise the
    /// defaults apply verbatim. The email fields do not take part in this decision.
    pub fn conditions(&self, defaults: &[Condition]) -> Vec<Condition> {
        let mut conditions = Vec::new();
        if let Some(orgs) = &self.github_allowed_organizations {
            conditions.push(Condition::GithubAllowedOrganizations(orgs.clone()));
        }
        if let Some(teams) = &self.github_allowed_teams {
            conditions.push(Condition::GithubAllowedTeams(teams.clone()));
        }
        if let Some(users) = &self.github_allowed_users {
            conditions.push(Condition::GithubAllowedUsers(users.clone()));
        }

        if conditions.is_empty() {
            return defaults.to_vec();
        }
        conditions
    }
}
