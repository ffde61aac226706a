//! Shared primitive IDs and profile-related enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Stable identity of an authenticated caller.
pub type UserId = String;
/// Store-allocated numeric entity identifier.
pub type EntityId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;
/// Entity version; the op sequence of the entity's last write, 0 when absent.
pub type Version = u64;

/// Already-verified caller identity handed in by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user id; keys the caller's profile.
    pub user_id: UserId,
    /// Primary email address.
    pub email: String,
    /// Display nickname used when the profile is first created.
    pub nickname: String,
}

/// T-shirt size preference stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeeShirtSize {
    /// No preference recorded.
    #[default]
    NotSpecified,
    /// Extra small, men's cut.
    XsM,
    /// Extra small, women's cut.
    XsW,
    /// Small, men's cut.
    SM,
    /// Small, women's cut.
    SW,
    /// Medium, men's cut.
    MM,
    /// Medium, women's cut.
    MW,
    /// Large, men's cut.
    LM,
    /// Large, women's cut.
    LW,
    /// Extra large, men's cut.
    XlM,
    /// Extra large, women's cut.
    XlW,
    /// 2XL, men's cut.
    XxlM,
    /// 2XL, women's cut.
    XxlW,
    /// 3XL, men's cut.
    XxxlM,
    /// 3XL, women's cut.
    XxxlW,
}

impl TeeShirtSize {
    const ALL: [(Self, &'static str); 15] = [
        (Self::NotSpecified, "NOT_SPECIFIED"),
        (Self::XsM, "XS_M"),
        (Self::XsW, "XS_W"),
        (Self::SM, "S_M"),
        (Self::SW, "S_W"),
        (Self::MM, "M_M"),
        (Self::MW, "M_W"),
        (Self::LM, "L_M"),
        (Self::LW, "L_W"),
        (Self::XlM, "XL_M"),
        (Self::XlW, "XL_W"),
        (Self::XxlM, "XXL_M"),
        (Self::XxlW, "XXL_W"),
        (Self::XxxlM, "XXXL_M"),
        (Self::XxxlW, "XXXL_W"),
    ];

    /// Wire name of the size, e.g. `XL_W`.
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(size, _)| *size == self)
            .map(|(_, name)| *name)
            .unwrap_or("NOT_SPECIFIED")
    }
}

impl fmt::Display for TeeShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeeShirtSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(size, _)| *size)
            .ok_or_else(|| format!("unknown t-shirt size: {s}"))
    }
}
