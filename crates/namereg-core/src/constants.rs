/// ─── Registry Constants ─────────────────────────────────────────────────────
///
/// Timestamps are nanoseconds since the Unix epoch (UTC).
/// Fees are denominated in e8s (1 ICP = 100,000,000 e8s).

// ── Time ──────────────────────────────────────────────────────────────────────

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Registration term. A domain expires one year after registration and each
/// renewal extends it by the same amount.
pub const ONE_YEAR_NANOS: u64 = 365 * 24 * 60 * 60 * NANOS_PER_SECOND;

// ── Fees ──────────────────────────────────────────────────────────────────────

/// 1 ICP expressed in e8s.
pub const E8S_PER_ICP: u64 = 100_000_000;

/// Renewal fee applied until an admin sets another one.
pub const DEFAULT_RENEWAL_FEE_E8S: u64 = 100_000_000;

// ── Names ─────────────────────────────────────────────────────────────────────

/// Longest registrable domain name (DNS label limit).
pub const MAX_DOMAIN_NAME_LEN: usize = 63;

/// Names shorter than this are "short names" and subject to the
/// short-name registration mode.
pub const SHORT_NAME_THRESHOLD: usize = 5;

/// Names reserved on every fresh registry.
pub const DEFAULT_RESERVED_NAMES: &[&str] = &[
    "icp", "api", "www", "admin", "root", "system", "registry", "canister", "dfinity", "ic",
];

// ── Seasons ───────────────────────────────────────────────────────────────────

/// Upper bound for both `min_letters` and `max_letters` of a season.
pub const SEASON_MAX_LETTERS: u64 = 64;

/// Seasons are numbered from 1; `0` in by-number lookups means "latest".
pub const FIRST_SEASON_ID: u64 = 1;

// ── Endpoints ─────────────────────────────────────────────────────────────────

/// Base URL of the derived per-domain discovery endpoint.
pub const DEFAULT_ENDPOINT_BASE: &str = "https://mcp.ctx.xyz";

/// Maximum length of a custom endpoint, in bytes.
pub const MAX_ENDPOINT_LEN: usize = 200;
