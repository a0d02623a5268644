pub mod pg;

pub use pg::{
    BlockedIpPgRepository, IpSecurityEventPgRepository, IpWhitelistPgRepository, SessionPgRepository,
    TokenPgRepository, TwoFactorPgRepository, UserPgRepository,
};
