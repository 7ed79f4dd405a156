use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use namereg_core::{
    AdminCreateDomainRequest, AdminGiftRequest, CreateSeasonRequest, DomainInfo,
    RegistrationMode, RegistrationRequest, SearchResult, Season, SeasonStats,
};

use crate::types::{RpcReceipt, RpcRegistryInfo, RpcTimestampedDomain};

/// Name registry JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "registry_" via `namespace = "registry"`.
/// Principals are base-58 strings; timestamps are nanoseconds since the
/// Unix epoch.
#[rpc(server, namespace = "registry")]
pub trait RegistryApi {
    // ── Seasons (admin) ───────────────────────────────────────────────────────

    /// Open a new season. Fails while another season is active.
    #[method(name = "createSeason")]
    async fn create_season(&self, caller: String, config: CreateSeasonRequest) -> RpcResult<RpcReceipt>;

    #[method(name = "deactivateSeason")]
    async fn deactivate_season(&self, caller: String, season_id: u64) -> RpcResult<RpcReceipt>;

    /// Add an external address to an active season's allow-list.
    #[method(name = "addAllowedAddress")]
    async fn add_allowed_address(&self, caller: String, season_id: u64, address: String) -> RpcResult<RpcReceipt>;

    // ── Domain creation ───────────────────────────────────────────────────────

    #[method(name = "registerDomain")]
    async fn register_domain(&self, caller: String, request: RegistrationRequest) -> RpcResult<RpcReceipt>;

    #[method(name = "adminCreateDomainWithAddress")]
    async fn admin_create_domain_with_address(
        &self,
        caller: String,
        request: AdminCreateDomainRequest,
    ) -> RpcResult<RpcReceipt>;

    #[method(name = "adminGiftDomain")]
    async fn admin_gift_domain(&self, caller: String, request: AdminGiftRequest) -> RpcResult<RpcReceipt>;

    // ── Domain maintenance ────────────────────────────────────────────────────

    #[method(name = "transferDomain")]
    async fn transfer_domain(&self, caller: String, domain_name: String, new_owner: String) -> RpcResult<RpcReceipt>;

    #[method(name = "renewDomain")]
    async fn renew_domain(&self, caller: String, domain_name: String, payment_block: u64) -> RpcResult<RpcReceipt>;

    /// `endpoint = null` clears the override.
    #[method(name = "setCustomMcpEndpoint")]
    async fn set_custom_mcp_endpoint(
        &self,
        caller: String,
        domain_name: String,
        endpoint: Option<String>,
    ) -> RpcResult<RpcReceipt>;

    // ── Registry policy (admin) ───────────────────────────────────────────────

    #[method(name = "addAdmin")]
    async fn add_admin(&self, caller: String, principal: String) -> RpcResult<RpcReceipt>;

    #[method(name = "removeAdmin")]
    async fn remove_admin(&self, caller: String, principal: String) -> RpcResult<RpcReceipt>;

    #[method(name = "addReservedName")]
    async fn add_reserved_name(&self, caller: String, name: String) -> RpcResult<RpcReceipt>;

    #[method(name = "approveUserForShortNames")]
    async fn approve_user_for_short_names(&self, caller: String, user: String) -> RpcResult<RpcReceipt>;

    #[method(name = "revokeShortNameApproval")]
    async fn revoke_short_name_approval(&self, caller: String, user: String) -> RpcResult<RpcReceipt>;

    #[method(name = "setShortNameMode")]
    async fn set_short_name_mode(&self, caller: String, mode: RegistrationMode) -> RpcResult<RpcReceipt>;

    #[method(name = "setBaseFee")]
    async fn set_base_fee(&self, caller: String, fee_e8s: u64) -> RpcResult<RpcReceipt>;

    // ── Domain queries ────────────────────────────────────────────────────────

    #[method(name = "getDomainInfo")]
    async fn get_domain_info(&self, domain_name: String) -> RpcResult<Option<DomainInfo>>;

    #[method(name = "getMcpEndpoint")]
    async fn get_mcp_endpoint(&self, domain_name: String) -> RpcResult<Option<String>>;

    /// Every domain, or only those held by `owner`.
    #[method(name = "listDomains")]
    async fn list_domains(&self, owner: Option<String>) -> RpcResult<Vec<DomainInfo>>;

    /// Case-insensitive substring search over unexpired names.
    #[method(name = "discoverDomains")]
    async fn discover_domains(&self, query: String) -> RpcResult<Vec<SearchResult>>;

    #[method(name = "getAllDomainsWithTimestamps")]
    async fn get_all_domains_with_timestamps(&self) -> RpcResult<Vec<RpcTimestampedDomain>>;

    /// Domains registered at or after `since`, oldest first.
    #[method(name = "getDomainsSinceTimestamp")]
    async fn get_domains_since_timestamp(&self, since: u64) -> RpcResult<Vec<RpcTimestampedDomain>>;

    #[method(name = "getWalletDomain")]
    async fn get_wallet_domain(&self, principal: String) -> RpcResult<Option<String>>;

    #[method(name = "getWalletDomains")]
    async fn get_wallet_domains(&self, principal: String) -> RpcResult<Vec<String>>;

    // ── Season queries ────────────────────────────────────────────────────────

    #[method(name = "getRegistrationSeason")]
    async fn get_registration_season(&self, season_id: u64) -> RpcResult<Option<Season>>;

    #[method(name = "getCurrentSeason")]
    async fn get_current_season(&self) -> RpcResult<Option<Season>>;

    #[method(name = "getActiveSeasons")]
    async fn get_active_seasons(&self) -> RpcResult<Vec<Season>>;

    #[method(name = "getAllSeasons")]
    async fn get_all_seasons(&self) -> RpcResult<Vec<Season>>;

    #[method(name = "getApplicableSeasonForDomain")]
    async fn get_applicable_season_for_domain(&self, domain_name: String) -> RpcResult<Option<Season>>;

    #[method(name = "getSeasonStats")]
    async fn get_season_stats(&self, season_id: u64) -> RpcResult<Option<SeasonStats>>;

    /// `0` selects the latest season.
    #[method(name = "getSeasonStatsByNumber")]
    async fn get_season_stats_by_number(&self, number: u64) -> RpcResult<Option<SeasonStats>>;

    #[method(name = "getAllSeasonStats")]
    async fn get_all_season_stats(&self) -> RpcResult<Vec<SeasonStats>>;

    #[method(name = "getSeasonAddresses")]
    async fn get_season_addresses(&self, season_id: u64) -> RpcResult<Vec<String>>;

    #[method(name = "isAddressAuthorizedForCurrentSeason")]
    async fn is_address_authorized_for_current_season(&self, address: String) -> RpcResult<bool>;

    // ── Fees, policy and node info ────────────────────────────────────────────

    #[method(name = "getRegistrationFee")]
    async fn get_registration_fee(&self, domain_name: String) -> RpcResult<u64>;

    #[method(name = "getRenewalFee")]
    async fn get_renewal_fee(&self) -> RpcResult<u64>;

    #[method(name = "canRegisterDomain")]
    async fn can_register_domain(&self, domain_name: String, user: String) -> RpcResult<bool>;

    #[method(name = "getAdmins")]
    async fn get_admins(&self) -> RpcResult<Vec<String>>;

    #[method(name = "isUserAdmin")]
    async fn is_user_admin(&self, user: String) -> RpcResult<bool>;

    #[method(name = "getApprovedShortUsers")]
    async fn get_approved_short_users(&self) -> RpcResult<Vec<String>>;

    #[method(name = "getShortNameMode")]
    async fn get_short_name_mode(&self) -> RpcResult<RegistrationMode>;

    #[method(name = "getReservedNames")]
    async fn get_reserved_names(&self) -> RpcResult<Vec<String>>;

    #[method(name = "getRegistryInfo")]
    async fn get_registry_info(&self) -> RpcResult<RpcRegistryInfo>;
}
