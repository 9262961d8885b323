//! Shared domain enums
//!
//! String representations are what the database stores, so the strum
//! `snake_case` serialization is part of the schema contract.

use strum::{Display, EnumString};

/// Merchant lifecycle status. Advances only forward except for
/// admin-driven resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MerchantStatus {
    /// Placeholder created at binding-code redemption, profile incomplete
    PendingSubmission,
    /// Profile submitted, waiting for admin review
    PendingApproval,
    /// Approved by an admin, not yet posted to the channel
    Approved,
    /// Live in the channel
    Published,
    /// Listing has lapsed
    Expired,
}

impl MerchantStatus {
    /// Every status, in lifecycle order. Queries that filter by a status
    /// predicate build their `IN (...)` lists from this roster so the
    /// rule lives here and nowhere else.
    pub const ALL: [MerchantStatus; 5] = [
        MerchantStatus::PendingSubmission,
        MerchantStatus::PendingApproval,
        MerchantStatus::Approved,
        MerchantStatus::Published,
        MerchantStatus::Expired,
    ];

    /// Statuses whose (publish_date, publish_slot) pair counts as
    /// occupying the slot.
    pub fn occupies_slot(self) -> bool {
        matches!(
            self,
            MerchantStatus::PendingApproval | MerchantStatus::Approved | MerchantStatus::Published
        )
    }

    /// Whether the merchant may still edit and (re)submit their profile.
    pub fn allows_submission(self) -> bool {
        matches!(
            self,
            MerchantStatus::PendingSubmission | MerchantStatus::PendingApproval
        )
    }

    /// Human-readable label shown in panels.
    pub fn display_name(self) -> &'static str {
        match self {
            MerchantStatus::PendingSubmission => "待提交",
            MerchantStatus::PendingApproval => "待审核",
            MerchantStatus::Approved => "已审核",
            MerchantStatus::Published => "已发布",
            MerchantStatus::Expired => "已过期",
        }
    }

    /// Forward-only transition check; admins bypass this via reset.
    pub fn can_advance_to(self, next: MerchantStatus) -> bool {
        use MerchantStatus::*;
        matches!(
            (self, next),
            (PendingSubmission, PendingApproval)
                | (PendingApproval, Approved)
                | (Approved, Published)
                | (Published, Expired)
        )
    }
}

/// The two merchant categories offered at step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MerchantType {
    Teacher,
    Business,
}

impl MerchantType {
    pub fn display_name(self) -> &'static str {
        match self {
            MerchantType::Teacher => "老师",
            MerchantType::Business => "商家",
        }
    }
}

/// Stored media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

/// Activity log action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    ButtonClick,
    UserInteraction,
    MerchantRegistration,
    BindingCodeUsed,
    AdminAction,
    SystemEvent,
    ErrorEvent,
}
