use strum::{AsRefStr, EnumString};

/// SSH compression algorithms.
///
/// Only `none` is proposed; the slot exists so the negotiation
/// covers every `SSH_MSG_KEXINIT` field.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Compress {
    /// No compression.
    #[default]
    None,
}
