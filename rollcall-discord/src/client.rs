use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use rollcall_core::{DirectorySnapshot, DirectorySource, Member, RoleName, Username};

use crate::error::{http_err, DiscordError};

pub const DISCORD_API: &str = "https://discord.com/api/v10";

/// Largest page the member listing endpoint accepts.
pub const MEMBER_PAGE_LIMIT: usize = 1000;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/rollcall/rollcall, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[derive(Debug, Clone, Deserialize)]
struct ApiRole {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiMember {
    user: Option<ApiUser>,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiGuild {
    name: String,
}

/// Who we are and which guild we can see, confirmed before the first pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyInfo {
    pub bot: String,
    pub guild: String,
}

/// Blocking Discord REST client scoped to a single guild.
pub struct DiscordClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
    guild_id: String,
}

impl DiscordClient {
    pub fn new(secret: &str, guild_id: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: DISCORD_API.to_string(),
            authorization: format!("Bot {secret}"),
            guild_id: guild_id.into(),
        }
    }

    /// Point the client at another API root, e.g. a local stand-in server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// Check the token and guild access. A pass must not start until this
    /// succeeds.
    pub fn ready(&self) -> Result<ReadyInfo, DiscordError> {
        let me: ApiUser = self.get("/users/@me", &[])?;
        let guild: ApiGuild = self.get(&format!("/guilds/{}", self.guild_id), &[])?;
        tracing::info!(bot = %me.username, guild = %guild.name, "discord ready");
        Ok(ReadyInfo {
            bot: me.username,
            guild: guild.name,
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, DiscordError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", &self.authorization);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| http_err(path, e))?;
        response.into_json().map_err(|source| DiscordError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }

    fn api_roles(&self) -> Result<Vec<ApiRole>, DiscordError> {
        self.get(&format!("/guilds/{}/roles", self.guild_id), &[])
    }

    fn api_members(&self) -> Result<Vec<ApiMember>, DiscordError> {
        let path = format!("/guilds/{}/members", self.guild_id);
        let limit = MEMBER_PAGE_LIMIT.to_string();
        let mut members = Vec::new();
        let mut after = "0".to_string();

        loop {
            let page: Vec<ApiMember> =
                self.get(&path, &[("limit", limit.as_str()), ("after", after.as_str())])?;
            let full_page = page.len() == MEMBER_PAGE_LIMIT;
            let next = last_user_id(&page);
            members.extend(page);
            match next {
                Some(id) if full_page => after = id,
                _ => break,
            }
        }

        tracing::debug!(count = members.len(), "fetched guild members");
        Ok(members)
    }
}

impl DirectorySource for DiscordClient {
    type Error = DiscordError;

    fn fetch_roles(&self) -> Result<Vec<RoleName>, DiscordError> {
        Ok(self
            .api_roles()?
            .into_iter()
            .map(|role| RoleName(role.name))
            .collect())
    }

    fn fetch_members(&self) -> Result<Vec<Member>, DiscordError> {
        let roles = self.api_roles()?;
        let members = self.api_members()?;
        Ok(into_snapshot(&self.guild_id, roles, members).members)
    }

    /// One role listing serves both the header and the id → name mapping.
    fn snapshot(&self) -> Result<DirectorySnapshot, DiscordError> {
        let roles = self.api_roles()?;
        let members = self.api_members()?;
        Ok(into_snapshot(&self.guild_id, roles, members))
    }
}

fn last_user_id(page: &[ApiMember]) -> Option<String> {
    page.iter()
        .rev()
        .find_map(|m| m.user.as_ref().map(|u| u.id.clone()))
}

/// Map API objects to a snapshot.
///
/// The REST member object omits the implicit `@everyone` role (whose id is
/// the guild id); it is added to every member so the roster matches what
/// the gateway reports. Role ids the listing doesn't know are dropped.
fn into_snapshot(guild_id: &str, roles: Vec<ApiRole>, members: Vec<ApiMember>) -> DirectorySnapshot {
    let names: HashMap<&str, &str> = roles
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();
    let everyone = names.get(guild_id).copied();

    let members = members
        .into_iter()
        .filter_map(|member| {
            let Some(user) = member.user else {
                tracing::warn!("skipping guild member without user object");
                return None;
            };
            let held: HashSet<RoleName> = member
                .roles
                .iter()
                .filter_map(|id| names.get(id.as_str()))
                .chain(everyone.as_ref())
                .map(|&name| RoleName::from(name))
                .collect();
            Some(Member {
                username: Username(user.username),
                nickname: member.nick,
                roles: held,
            })
        })
        .collect();

    DirectorySnapshot {
        roles: roles.into_iter().map(|r| RoleName(r.name)).collect(),
        members,
    }
}
