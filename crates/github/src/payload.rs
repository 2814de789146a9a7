//! Webhook payload models.
//!
//! Only the fields autodeploy reads are modelled; everything else in GitHub's
//! payloads is ignored during deserialisation.

use serde::Deserialize;

/// The `repository` object shared by ping and push payloads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: Option<String>,
    /// `https://github.com/owner/name.git`
    pub clone_url: Option<String>,
    /// `git@github.com:owner/name.git`
    pub ssh_url: Option<String>,
    /// `git://github.com/owner/name.git`
    pub git_url: Option<String>,
    /// `https://github.com/owner/name`
    pub html_url: Option<String>,
    /// For push events this is the `html_url`; for other events the API URL.
    pub url: Option<String>,
    pub svn_url: Option<String>,
}

impl RepositoryPayload {
    /// Every URL form present in the payload, in a fixed order.
    pub fn url_forms(&self) -> impl Iterator<Item = &str> {
        [
            &self.clone_url,
            &self.ssh_url,
            &self.git_url,
            &self.html_url,
            &self.url,
            &self.svn_url,
        ]
        .into_iter()
        .filter_map(|u| u.as_deref())
    }
}

/// Sent once when a webhook is created.
#[derive(Debug, Clone, Deserialize)]
pub struct PingPayload {
    pub zen: String,
    pub repository: Option<RepositoryPayload>,
}

/// Sent for every push to a branch or tag.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub reference: String,
    pub before: String,
    pub after: Option<String>,
    pub head_commit: Option<CommitPayload>,
    pub repository: RepositoryPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitPayload {
    pub id: String,
}
