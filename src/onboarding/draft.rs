//! The accumulated answer map for an in-progress registration

use serde::{Deserialize, Serialize};

use crate::core::types::MerchantType;
use crate::core::{AppError, AppResult};
use crate::storage::merchants::MerchantUpdate;

/// Answers collected so far, keyed by target field. Serialized as JSON
/// into `fsm_states.answers` after every step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub merchant_type: Option<MerchantTypeAnswer>,
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    pub p_price: Option<String>,
    pub pp_price: Option<String>,
    pub adv_sentence: Option<String>,
    pub channel_username: Option<String>,
    #[serde(default)]
    pub keywords: Vec<i64>,
    pub publish_date: Option<String>,
    pub publish_slot: Option<String>,
    /// Edit mode: an accepted answer writes to the merchant row and
    /// returns to the summary instead of advancing.
    #[serde(default)]
    pub edit_mode: bool,
}

/// Stored as the snake_case string so drafts stay readable in the table.
pub type MerchantTypeAnswer = String;

impl Draft {
    pub fn from_value(value: &serde_json::Value) -> AppResult<Draft> {
        serde_json::from_value(value.clone()).map_err(AppError::from)
    }

    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        serde_json::to_value(self).map_err(AppError::from)
    }

    pub fn merchant_type(&self) -> Option<MerchantType> {
        self.merchant_type.as_deref().and_then(|t| t.parse().ok())
    }

    /// Whether the step's target field already holds an answer.
    pub fn step_filled(&self, step: u8) -> bool {
        match step {
            1 => self.merchant_type.is_some(),
            2 => self.city_id.is_some(),
            3 => self.district_id.is_some(),
            4 => self.p_price.is_some(),
            5 => self.pp_price.is_some(),
            6 => self.adv_sentence.is_some(),
            7 => self.channel_username.is_some(),
            8 => !self.keywords.is_empty(),
            9 => self.publish_date.is_some() && self.publish_slot.is_some(),
            _ => false,
        }
    }

    /// Scalar fields the final confirmation requires to be non-empty.
    /// Returns the step numbers still missing, in order.
    pub fn missing_required_steps(&self) -> Vec<u8> {
        (1u8..=9).filter(|&s| !self.step_filled(s)).collect()
    }

    /// The field updates to apply to the merchant row at submission.
    pub fn as_update(&self) -> MerchantUpdate {
        MerchantUpdate {
            merchant_type: self.merchant_type(),
            city_id: self.city_id,
            district_id: self.district_id,
            p_price: self.p_price.clone(),
            pp_price: self.pp_price.clone(),
            adv_sentence: self.adv_sentence.clone(),
            channel_username: self.channel_username.clone(),
            ..Default::default()
        }
    }
}
