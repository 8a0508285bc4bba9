//! Sensitive-field declarations per record type.
//!
//! Static tables declaring which fields of each record type hold
//! secrets. Fields listed here are envelope-encrypted by the storage
//! proxy; everything else - display names, folder assignments, tags,
//! timestamps - stays plaintext so the backend can sort and filter it.

/// Well-known record type names.
pub mod record_types {
    pub const CREDENTIAL: &str = "credential";
    pub const TOTP_SECRET: &str = "totp-secret";
    pub const SECURE_NOTE: &str = "secure-note";
    pub const VAULT_META: &str = "vault-meta";
    pub const SETTINGS: &str = "settings";
    pub const KEY_ESCROW: &str = "key-escrow";
}

/// Which fields of a record type are sealed before storage.
#[derive(Debug, Clone, Copy)]
pub struct SensitiveRecordSchema {
    pub record_type: &'static str,
    pub sensitive_fields: &'static [&'static str],
}

/// Login credentials: everything identifying beyond the display name is
/// sealed, including the URL, which reveals where the account lives.
const CREDENTIAL: SensitiveRecordSchema = SensitiveRecordSchema {
    record_type: record_types::CREDENTIAL,
    sensitive_fields: &["username", "password", "url", "notes"],
};

const TOTP_SECRET: SensitiveRecordSchema = SensitiveRecordSchema {
    record_type: record_types::TOTP_SECRET,
    sensitive_fields: &["secret"],
};

const SECURE_NOTE: SensitiveRecordSchema = SensitiveRecordSchema {
    record_type: record_types::SECURE_NOTE,
    sensitive_fields: &["body"],
};

static SCHEMAS: &[SensitiveRecordSchema] = &[CREDENTIAL, TOTP_SECRET, SECURE_NOTE];

/// Look up the sensitive-field schema for a record type. `None` means
/// the type carries no secrets and the proxy passes it through whole.
pub fn schema_for(record_type: &str) -> Option<&'static SensitiveRecordSchema> {
    SCHEMAS.iter().find(|s| s.record_type == record_type)
}

/// Whether a specific field of a record type is sensitive.
pub fn is_sensitive(record_type: &str, field: &str) -> bool {
    schema_for(record_type)
        .map(|s| s.sensitive_fields.contains(&field))
        .unwrap_or(false)
}
