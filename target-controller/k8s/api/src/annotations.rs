//! Service annotations that configure a proxy target.
//!
//! A service is only proxied when it carries [`HOST`]. List-valued annotations are
//! comma-delimited. Secret annotations hold a JSON reference such as
//! `{"secretName": "creds", "dataName": "token"}`.

pub const HOST: &str = "kube-auth-proxy/host";
pub const TARGET_PORT: &str = "kube-auth-proxy/targetPort";

pub const ALLOWED_EMAILS: &str = "kube-auth-proxy/allowedEmails";
pub const EMAIL_DOMAINS: &str = "kube-auth-proxy/emailDomains";
pub const GITHUB_ALLOWED_ORGS: &str = "kube-auth-proxy/githubAllowedOrgs";
pub const GITHUB_ALLOWED_TEAMS: &str = "kube-auth-proxy/githubAllowedTeams";
pub const GITHUB_ALLOWED_USERS: &str = "kube-auth-proxy/githubAllowedUsers";

pub const BEARER_TOKEN_SECRET: &str = "kube-auth-proxy/bearerTokenSecret";
pub const BASIC_AUTH_USERNAME: &str = "kube-auth-proxy/basicAuthUsername";
pub const BASIC_AUTH_PASSWORD: &str = "kube-auth-proxy/basicAuthPassword";
pub const BASIC_AUTH_PASSWORD_SECRET: &str = "kube-auth-proxy/basicAuthPasswordSecret";
