use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tracing::info;

use namereg_core::error::{ErrorKind, RegistryError};
use namereg_core::{
    AdminCreateDomainRequest, AdminGiftRequest, Command, CreateSeasonRequest, DomainInfo,
    Principal, Receipt, RegistrationMode, RegistrationRequest, SearchResult, Season, SeasonStats,
};
use namereg_state::{Clock, RegistryQuery};

use crate::api::RegistryApiServer;
use crate::types::{RpcReceipt, RpcRegistryInfo, RpcTimestampedDomain};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Map a registry failure onto a JSON-RPC error object.
///
/// Malformed input is `-32602`, storage and other internal faults are
/// `-32603`, and every rule rejection is `-32000` carrying the registry's
/// message verbatim.
pub fn registry_err(e: RegistryError) -> ErrorObject<'static> {
    match e.kind() {
        ErrorKind::InvalidRequest => rpc_err(-32602, e.to_string()),
        ErrorKind::Internal => rpc_err(-32603, e.to_string()),
        _ => rpc_err(-32000, e.to_string()),
    }
}

fn parse_principal(text: &str) -> Result<Principal, ErrorObject<'static>> {
    Principal::from_b58(text).map_err(registry_err)
}

/// A mutation waiting for the node's single writer.
pub struct Submission {
    pub caller: Principal,
    pub command: Command,
    pub reply: oneshot::Sender<Result<Receipt, RegistryError>>,
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub query: RegistryQuery,
    pub clock: Arc<dyn Clock>,
    /// Queue into the writer loop that owns the `RegistryEngine`.
    pub submissions: mpsc::Sender<Submission>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr`. Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let middleware = tower::ServiceBuilder::new().layer(CorsLayer::permissive());
        let server = Server::builder()
            .set_http_middleware(middleware)
            .build(addr)
            .await?;
        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }

    async fn submit(&self, caller: String, command: Command) -> RpcResult<RpcReceipt> {
        let caller = parse_principal(&caller)?;
        let (reply, rx) = oneshot::channel();
        self.state
            .submissions
            .send(Submission { caller, command, reply })
            .await
            .map_err(|_| rpc_err(-32603, "registry writer is not running"))?;
        let receipt = rx
            .await
            .map_err(|_| rpc_err(-32603, "registry writer dropped the request"))?
            .map_err(registry_err)?;
        Ok(receipt.into())
    }

    fn now(&self) -> u64 {
        self.state.clock.now()
    }

    fn timestamped(entries: Vec<(String, u64, DomainInfo)>) -> Vec<RpcTimestampedDomain> {
        entries
            .into_iter()
            .map(|(domain_name, registration_time, info)| RpcTimestampedDomain {
                domain_name,
                registration_time,
                info,
            })
            .collect()
    }
}

#[async_trait]
impl RegistryApiServer for RpcServer {
    async fn create_season(&self, caller: String, config: CreateSeasonRequest) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::CreateSeason(config)).await
    }

    async fn deactivate_season(&self, caller: String, season_id: u64) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::DeactivateSeason { season_id }).await
    }

    async fn add_allowed_address(&self, caller: String, season_id: u64, address: String) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::AddAllowedAddress { season_id, address }).await
    }

    async fn register_domain(&self, caller: String, request: RegistrationRequest) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::Register(request)).await
    }

    async fn admin_create_domain_with_address(
        &self,
        caller: String,
        request: AdminCreateDomainRequest,
    ) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::AdminCreateWithAddress(request)).await
    }

    async fn admin_gift_domain(&self, caller: String, request: AdminGiftRequest) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::AdminGift(request)).await
    }

    async fn transfer_domain(&self, caller: String, domain_name: String, new_owner: String) -> RpcResult<RpcReceipt> {
        let new_owner = parse_principal(&new_owner)?;
        self.submit(caller, Command::Transfer { domain_name, new_owner }).await
    }

    async fn renew_domain(&self, caller: String, domain_name: String, payment_block: u64) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::Renew { domain_name, payment_block }).await
    }

    async fn set_custom_mcp_endpoint(
        &self,
        caller: String,
        domain_name: String,
        endpoint: Option<String>,
    ) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::SetCustomEndpoint { domain_name, endpoint }).await
    }

    async fn add_admin(&self, caller: String, principal: String) -> RpcResult<RpcReceipt> {
        let target = parse_principal(&principal)?;
        self.submit(caller, Command::AddAdmin(target)).await
    }

    async fn remove_admin(&self, caller: String, principal: String) -> RpcResult<RpcReceipt> {
        let target = parse_principal(&principal)?;
        self.submit(caller, Command::RemoveAdmin(target)).await
    }

    async fn add_reserved_name(&self, caller: String, name: String) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::AddReservedName(name)).await
    }

    async fn approve_user_for_short_names(&self, caller: String, user: String) -> RpcResult<RpcReceipt> {
        let user = parse_principal(&user)?;
        self.submit(caller, Command::ApproveShortNameUser(user)).await
    }

    async fn revoke_short_name_approval(&self, caller: String, user: String) -> RpcResult<RpcReceipt> {
        let user = parse_principal(&user)?;
        self.submit(caller, Command::RevokeShortNameUser(user)).await
    }

    async fn set_short_name_mode(&self, caller: String, mode: RegistrationMode) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::SetShortNameMode(mode)).await
    }

    async fn set_base_fee(&self, caller: String, fee_e8s: u64) -> RpcResult<RpcReceipt> {
        self.submit(caller, Command::SetBaseFee(fee_e8s)).await
    }

    async fn get_domain_info(&self, domain_name: String) -> RpcResult<Option<DomainInfo>> {
        Ok(self.state.query.get_domain_info(&domain_name, self.now()).map_err(registry_err)?)
    }

    async fn get_mcp_endpoint(&self, domain_name: String) -> RpcResult<Option<String>> {
        Ok(self.state.query.get_mcp_endpoint(&domain_name).map_err(registry_err)?)
    }

    async fn list_domains(&self, owner: Option<String>) -> RpcResult<Vec<DomainInfo>> {
        let owner = owner.as_deref().map(parse_principal).transpose()?;
        Ok(self
            .state
            .query
            .list_domains(owner.as_ref(), self.now())
            .map_err(registry_err)?)
    }

    async fn discover_domains(&self, query: String) -> RpcResult<Vec<SearchResult>> {
        Ok(self.state.query.discover_domains(&query, self.now()).map_err(registry_err)?)
    }

    async fn get_all_domains_with_timestamps(&self) -> RpcResult<Vec<RpcTimestampedDomain>> {
        let entries = self
            .state
            .query
            .get_all_domains_with_timestamps(self.now())
            .map_err(registry_err)?;
        Ok(Self::timestamped(entries))
    }

    async fn get_domains_since_timestamp(&self, since: u64) -> RpcResult<Vec<RpcTimestampedDomain>> {
        let entries = self
            .state
            .query
            .get_domains_since_timestamp(since, self.now())
            .map_err(registry_err)?
            .into_iter()
            .map(|(name, info)| {
                let ts = info.registration_time;
                (name, ts, info)
            })
            .collect();
        Ok(Self::timestamped(entries))
    }

    async fn get_wallet_domain(&self, principal: String) -> RpcResult<Option<String>> {
        let owner = parse_principal(&principal)?;
        Ok(self.state.query.get_wallet_domain(&owner).map_err(registry_err)?)
    }

    async fn get_wallet_domains(&self, principal: String) -> RpcResult<Vec<String>> {
        let owner = parse_principal(&principal)?;
        Ok(self.state.query.get_wallet_domains(&owner).map_err(registry_err)?)
    }

    async fn get_registration_season(&self, season_id: u64) -> RpcResult<Option<Season>> {
        Ok(self.state.query.get_registration_season(season_id).map_err(registry_err)?)
    }

    async fn get_current_season(&self) -> RpcResult<Option<Season>> {
        Ok(self.state.query.get_current_season().map_err(registry_err)?)
    }

    async fn get_active_seasons(&self) -> RpcResult<Vec<Season>> {
        Ok(self.state.query.get_active_seasons().map_err(registry_err)?)
    }

    async fn get_all_seasons(&self) -> RpcResult<Vec<Season>> {
        Ok(self.state.query.get_all_seasons().map_err(registry_err)?)
    }

    async fn get_applicable_season_for_domain(&self, domain_name: String) -> RpcResult<Option<Season>> {
        Ok(self
            .state
            .query
            .get_applicable_season_for_domain(&domain_name)
            .map_err(registry_err)?)
    }

    async fn get_season_stats(&self, season_id: u64) -> RpcResult<Option<SeasonStats>> {
        Ok(self.state.query.get_season_stats(season_id).map_err(registry_err)?)
    }

    async fn get_season_stats_by_number(&self, number: u64) -> RpcResult<Option<SeasonStats>> {
        Ok(self.state.query.get_season_stats_by_number(number).map_err(registry_err)?)
    }

    async fn get_all_season_stats(&self) -> RpcResult<Vec<SeasonStats>> {
        Ok(self.state.query.get_all_season_stats().map_err(registry_err)?)
    }

    async fn get_season_addresses(&self, season_id: u64) -> RpcResult<Vec<String>> {
        Ok(self.state.query.get_season_addresses(season_id).map_err(registry_err)?)
    }

    async fn is_address_authorized_for_current_season(&self, address: String) -> RpcResult<bool> {
        Ok(self
            .state
            .query
            .is_address_authorized_for_current_season(&address)
            .map_err(registry_err)?)
    }

    async fn get_registration_fee(&self, domain_name: String) -> RpcResult<u64> {
        Ok(self.state.query.get_registration_fee(&domain_name).map_err(registry_err)?)
    }

    async fn get_renewal_fee(&self) -> RpcResult<u64> {
        Ok(self.state.query.get_renewal_fee().map_err(registry_err)?)
    }

    async fn can_register_domain(&self, domain_name: String, user: String) -> RpcResult<bool> {
        let user = parse_principal(&user)?;
        Ok(self.state.query.can_register_domain(&domain_name, &user).map_err(registry_err)?)
    }

    async fn get_admins(&self) -> RpcResult<Vec<String>> {
        let admins = self.state.query.get_admins().map_err(registry_err)?;
        Ok(admins.iter().map(Principal::to_b58).collect())
    }

    async fn is_user_admin(&self, user: String) -> RpcResult<bool> {
        let user = parse_principal(&user)?;
        Ok(self.state.query.is_user_admin(&user).map_err(registry_err)?)
    }

    async fn get_approved_short_users(&self) -> RpcResult<Vec<String>> {
        let users = self.state.query.get_approved_short_users().map_err(registry_err)?;
        Ok(users.iter().map(Principal::to_b58).collect())
    }

    async fn get_short_name_mode(&self) -> RpcResult<RegistrationMode> {
        Ok(self.state.query.get_short_name_mode().map_err(registry_err)?)
    }

    async fn get_reserved_names(&self) -> RpcResult<Vec<String>> {
        Ok(self.state.query.get_reserved_names().map_err(registry_err)?)
    }

    async fn get_registry_info(&self) -> RpcResult<RpcRegistryInfo> {
        let q = &self.state.query;
        Ok(RpcRegistryInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoint_base: q.endpoint_base().map_err(registry_err)?,
            domain_count: q.domain_count().map_err(registry_err)? as u64,
            current_season: q
                .get_current_season()
                .map_err(registry_err)?
                .map(|s| s.season_id),
            now: self.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namereg_state::{ManualClock, RegistryEngine, StagedMutations, StateDb};

    const START: u64 = 1_700_000_000_000_000_000;

    fn temp_server(name: &str) -> (RpcServer, Principal) {
        let dir = std::env::temp_dir().join(format!("namereg_rpc_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).expect("open temp db"));
        let admin = Principal::derive(b"admin");
        let mut staged = StagedMutations::default();
        staged.admins_added.push(admin);
        db.commit(&staged).unwrap();

        let clock = Arc::new(ManualClock::new(START));
        let mut engine = RegistryEngine::new(db.clone()).with_clock(clock.clone());
        let (tx, mut rx) = mpsc::channel::<Submission>(16);
        tokio::spawn(async move {
            while let Some(sub) = rx.recv().await {
                let _ = sub.reply.send(engine.execute(sub.caller, sub.command));
            }
        });

        let state = RpcServerState {
            query: RegistryQuery::new(db),
            clock,
            submissions: tx,
        };
        (RpcServer::new(Arc::new(state)), admin)
    }

    #[test]
    fn error_codes_follow_kind() {
        assert_eq!(registry_err(RegistryError::LastAdmin).code(), -32602);
        assert_eq!(registry_err(RegistryError::Storage("disk".into())).code(), -32603);
        let rule = registry_err(RegistryError::NoActiveSeason);
        assert_eq!(rule.code(), -32000);
        assert_eq!(rule.message(), "No available registration season");
    }

    #[tokio::test]
    async fn mutations_go_through_the_writer() {
        let (server, admin) = temp_server("writer");
        let season = CreateSeasonRequest {
            min_letters: 4,
            max_letters: Some(10),
            total_allowed: 2,
            price_icp: 10,
        };
        let receipt = server.create_season(admin.to_b58(), season).await.unwrap();
        assert_eq!(receipt.season_id, Some(1));
        assert_eq!(server.get_current_season().await.unwrap().unwrap().season_id, 1);

        let user = Principal::derive(b"user");
        let request = RegistrationRequest {
            domain_name: "user1domain".into(),
            administrator: user,
            operator: user,
            payment_block: 7,
        };
        let receipt = server.register_domain(user.to_b58(), request).await.unwrap();
        assert!(receipt.message.contains("registered successfully"));
        assert_eq!(
            server.get_wallet_domain(user.to_b58()).await.unwrap().as_deref(),
            Some("user1domain")
        );

        let stamped = server.get_domains_since_timestamp(0).await.unwrap();
        assert_eq!(stamped.len(), 1);
        assert_eq!(stamped[0].registration_time, stamped[0].info.registration_time);
    }

    #[tokio::test]
    async fn racing_registrations_take_the_last_slot_once() {
        let (server, admin) = temp_server("last_slot");
        let server = Arc::new(server);
        let season = CreateSeasonRequest {
            min_letters: 4,
            max_letters: Some(10),
            total_allowed: 1,
            price_icp: 10,
        };
        server.create_season(admin.to_b58(), season).await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..8u8 {
            let server = server.clone();
            tasks.push(tokio::spawn(async move {
                let user = Principal::derive(&[b'r', n]);
                let request = RegistrationRequest {
                    domain_name: format!("racer{n}name"),
                    administrator: user,
                    operator: user,
                    payment_block: 1,
                };
                server.register_domain(user.to_b58(), request).await
            }));
        }

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => assert!(err.message().contains("season is full"), "{}", err.message()),
            }
        }
        assert_eq!(winners, 1);

        let stats = server.get_season_stats(1).await.unwrap().unwrap();
        assert_eq!(stats.names_taken, 1);
        assert_eq!(stats.status, namereg_core::SeasonStatus::Completed);
        assert_eq!(server.get_all_domains_with_timestamps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejections_and_bad_principals_surface_as_errors() {
        let (server, _admin) = temp_server("rejections");
        let user = Principal::derive(b"user");
        let err = server.deactivate_season(user.to_b58(), 1).await.unwrap_err();
        assert_eq!(err.code(), -32000);
        assert!(err.message().starts_with("Unauthorized"));

        let err = server.get_wallet_domain("0OIl".into()).await.unwrap_err();
        assert_eq!(err.code(), -32602);
    }
}
