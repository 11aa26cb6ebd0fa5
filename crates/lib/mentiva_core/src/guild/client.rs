// @zen-component: GLD-GuildClient
//
//! Discord REST adapter for guild membership.
//!
//! One HTTP call per operation, mapped onto the tri-state outcomes in the
//! parent module. No retries here; a 429 or a timeout surfaces as `Failed`
//! and the caller decides what, if anything, to do about it.

use serde::Serialize;
use tracing::debug;

use super::{AddMemberOutcome, GuildApi, GuildFailure, MembershipStatus, RemoveMemberOutcome};
use crate::config::GuildConfig;

#[derive(Serialize)]
struct AddMemberRequest<'a> {
    access_token: &'a str,
}

pub struct GuildClient {
    client: reqwest::Client,
    config: GuildConfig,
}

impl GuildClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: GuildConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn member_url(&self, discord_id: &str) -> String {
        format!(
            "{}/guilds/{}/members/{}",
            self.config.api_base_url, self.config.guild_id, discord_id
        )
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }
}

#[async_trait::async_trait]
impl GuildApi for GuildClient {
    /// `PUT /guilds/{guild}/members/{id}` with the user's OAuth access token.
    /// 201 = added, 204 = already a member.
    async fn add_member(&self, discord_id: &str, access_token: &str) -> AddMemberOutcome {
        let result = self
            .client
            .put(self.member_url(discord_id))
            .header("Authorization", self.auth_header())
            .json(&AddMemberRequest { access_token })
            .send()
            .await;

        match result {
            Ok(resp) => match resp.status().as_u16() {
                201 => AddMemberOutcome::Created,
                204 => AddMemberOutcome::AlreadyMember,
                status => {
                    debug!(discord_id, status, "guild add returned non-success");
                    AddMemberOutcome::Failed(GuildFailure::Status(status))
                }
            },
            Err(e) => AddMemberOutcome::Failed(GuildFailure::Transport(e.to_string())),
        }
    }

    /// `DELETE /guilds/{guild}/members/{id}`. 204 = removed, 404 = was not
    /// a member.
    async fn remove_member(&self, discord_id: &str) -> RemoveMemberOutcome {
        let result = self
            .client
            .delete(self.member_url(discord_id))
            .header("Authorization", self.auth_header())
            .send()
            .await;

        match result {
            Ok(resp) => match resp.status().as_u16() {
                204 => RemoveMemberOutcome::Removed,
                404 => RemoveMemberOutcome::AlreadyAbsent,
                status => {
                    debug!(discord_id, status, "guild remove returned non-success");
                    RemoveMemberOutcome::Failed(GuildFailure::Status(status))
                }
            },
            Err(e) => RemoveMemberOutcome::Failed(GuildFailure::Transport(e.to_string())),
        }
    }

    /// `GET /guilds/{guild}/members/{id}`. Only a 404 confirms absence;
    /// anything else non-2xx (401, 429, 5xx) is indeterminate.
    async fn get_membership(&self, discord_id: &str) -> MembershipStatus {
        let result = self
            .client
            .get(self.member_url(discord_id))
            .header("Authorization", self.auth_header())
            .send()
            .await;

        match result {
            Ok(resp) => match resp.status().as_u16() {
                200 => MembershipStatus::Present,
                404 => MembershipStatus::Absent,
                status => MembershipStatus::Failed(GuildFailure::Status(status)),
            },
            Err(e) => MembershipStatus::Failed(GuildFailure::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn member_url_includes_guild_and_member() {
        let client = GuildClient::new(GuildConfig {
            api_base_url: "https://discord.com/api/v10".into(),
            guild_id: "111222333".into(),
            bot_token: "token".into(),
            http_timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            client.member_url("42"),
            "https://discord.com/api/v10/guilds/111222333/members/42"
        );
        assert_eq!(client.auth_header(), "Bot token");
    }
}
