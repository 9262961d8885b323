//! Callback-data command codec
//!
//! Every inline button carries one `CallbackCommand`, encoded as a short
//! prefixed string and decoded back by a single parser. One `match` on the
//! decoded variant replaces prefix-by-prefix string dispatch; unknown or
//! legacy payloads decode to `None` and are answered with a no-op notice.

use crate::onboarding::FlowAction;

/// Admin panel operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Panel,
    Stats,
    Codes,
    GenCode,
    Regions,
    ShowCity(i64),
    AddCity,
    AddDistrict(i64),
    ToggleCity(i64),
    DeleteCity(i64),
    ToggleDistrict(i64),
    DeleteDistrict(i64),
    Slots,
    AddSlot,
    ToggleSlot(i64),
    DeleteSlot(i64),
    Keywords,
    AddKeyword,
    ToggleKeyword(i64),
    DeleteKeyword(i64),
    Approve(i64),
    Reject(i64),
}

/// Everything a button can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCommand {
    Flow(FlowAction),
    Admin(AdminAction),
    Noop,
}

impl CallbackCommand {
    /// Serializes into callback data (stays well under Telegram's
    /// 64-byte limit).
    pub fn encode(&self) -> String {
        match self {
            CallbackCommand::Noop => "noop".to_string(),
            CallbackCommand::Flow(action) => match action {
                FlowAction::ChooseType(value) => format!("bf:type:{}", value),
                FlowAction::ChooseCity(id) => format!("bf:city:{}", id),
                FlowAction::ChooseDistrict(id) => format!("bf:dist:{}", id),
                FlowAction::ToggleKeyword(id) => format!("bf:kw:{}", id),
                FlowAction::KeywordsDone => "bf:kwdone".to_string(),
                FlowAction::PickDate(date) => format!("bf:date:{}", date),
                FlowAction::PickSlot(slot) => format!("bf:slot:{}", slot),
                FlowAction::MediaDone => "bf:mediadone".to_string(),
                FlowAction::GoToStep(step) => format!("bf:goto:{}", step),
                FlowAction::Overview => "bf:overview".to_string(),
                FlowAction::Confirm => "bf:confirm".to_string(),
                FlowAction::EditField(step) => format!("bf:edit:{}", step),
                FlowAction::Noop => "noop".to_string(),
            },
            CallbackCommand::Admin(action) => match action {
                AdminAction::Panel => "adm:panel".to_string(),
                AdminAction::Stats => "adm:stats".to_string(),
                AdminAction::Codes => "adm:codes".to_string(),
                AdminAction::GenCode => "adm:gencode".to_string(),
                AdminAction::Regions => "adm:regions".to_string(),
                AdminAction::ShowCity(id) => format!("adm:city:{}", id),
                AdminAction::AddCity => "adm:addcity".to_string(),
                AdminAction::AddDistrict(city_id) => format!("adm:adddist:{}", city_id),
                AdminAction::ToggleCity(id) => format!("adm:ctoggle:{}", id),
                AdminAction::DeleteCity(id) => format!("adm:cdel:{}", id),
                AdminAction::ToggleDistrict(id) => format!("adm:dtoggle:{}", id),
                AdminAction::DeleteDistrict(id) => format!("adm:ddel:{}", id),
                AdminAction::Slots => "adm:slots".to_string(),
                AdminAction::AddSlot => "adm:addslot".to_string(),
                AdminAction::ToggleSlot(id) => format!("adm:stoggle:{}", id),
                AdminAction::DeleteSlot(id) => format!("adm:sdel:{}", id),
                AdminAction::Keywords => "adm:keywords".to_string(),
                AdminAction::AddKeyword => "adm:addkw".to_string(),
                AdminAction::ToggleKeyword(id) => format!("adm:ktoggle:{}", id),
                AdminAction::DeleteKeyword(id) => format!("adm:kdel:{}", id),
                AdminAction::Approve(id) => format!("adm:approve:{}", id),
                AdminAction::Reject(id) => format!("adm:reject:{}", id),
            },
        }
    }

    /// Decodes callback data. `None` means unknown/legacy payload.
    pub fn parse(data: &str) -> Option<CallbackCommand> {
        if data == "noop" {
            return Some(CallbackCommand::Noop);
        }

        if let Some(rest) = data.strip_prefix("bf:") {
            let (op, arg) = match rest.split_once(':') {
                Some((op, arg)) => (op, arg),
                None => (rest, ""),
            };
            let action = match op {
                "type" => FlowAction::ChooseType(arg.to_string()),
                "city" => FlowAction::ChooseCity(arg.parse().ok()?),
                "dist" => FlowAction::ChooseDistrict(arg.parse().ok()?),
                "kw" => FlowAction::ToggleKeyword(arg.parse().ok()?),
                "kwdone" => FlowAction::KeywordsDone,
                "date" => FlowAction::PickDate(arg.to_string()),
                // Slot values contain ':' themselves ("20:00"); arg is the
                // remainder after the second separator, unsplit.
                "slot" => FlowAction::PickSlot(arg.to_string()),
                "mediadone" => FlowAction::MediaDone,
                "goto" => FlowAction::GoToStep(arg.parse().ok()?),
                "overview" => FlowAction::Overview,
                "confirm" => FlowAction::Confirm,
                "edit" => FlowAction::EditField(arg.parse().ok()?),
                _ => return None,
            };
            return Some(CallbackCommand::Flow(action));
        }

        if let Some(rest) = data.strip_prefix("adm:") {
            let (op, arg) = match rest.split_once(':') {
                Some((op, arg)) => (op, arg),
                None => (rest, ""),
            };
            let action = match op {
                "panel" => AdminAction::Panel,
                "stats" => AdminAction::Stats,
                "codes" => AdminAction::Codes,
                "gencode" => AdminAction::GenCode,
                "regions" => AdminAction::Regions,
                "city" => AdminAction::ShowCity(arg.parse().ok()?),
                "addcity" => AdminAction::AddCity,
                "adddist" => AdminAction::AddDistrict(arg.parse().ok()?),
                "ctoggle" => AdminAction::ToggleCity(arg.parse().ok()?),
                "cdel" => AdminAction::DeleteCity(arg.parse().ok()?),
                "dtoggle" => AdminAction::ToggleDistrict(arg.parse().ok()?),
                "ddel" => AdminAction::DeleteDistrict(arg.parse().ok()?),
                "slots" => AdminAction::Slots,
                "addslot" => AdminAction::AddSlot,
                "stoggle" => AdminAction::ToggleSlot(arg.parse().ok()?),
                "sdel" => AdminAction::DeleteSlot(arg.parse().ok()?),
                "keywords" => AdminAction::Keywords,
                "addkw" => AdminAction::AddKeyword,
                "ktoggle" => AdminAction::ToggleKeyword(arg.parse().ok()?),
                "kdel" => AdminAction::DeleteKeyword(arg.parse().ok()?),
                "approve" => AdminAction::Approve(arg.parse().ok()?),
                "reject" => AdminAction::Reject(arg.parse().ok()?),
                _ => return None,
            };
            return Some(CallbackCommand::Admin(action));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_round_trip() {
        let commands = vec![
            CallbackCommand::Flow(FlowAction::ChooseType("teacher".to_string())),
            CallbackCommand::Flow(FlowAction::ChooseCity(12)),
            CallbackCommand::Flow(FlowAction::ChooseDistrict(7)),
            CallbackCommand::Flow(FlowAction::ToggleKeyword(3)),
            CallbackCommand::Flow(FlowAction::KeywordsDone),
            CallbackCommand::Flow(FlowAction::PickDate("2026-08-07".to_string())),
            CallbackCommand::Flow(FlowAction::PickSlot("20:00".to_string())),
            CallbackCommand::Flow(FlowAction::MediaDone),
            CallbackCommand::Flow(FlowAction::GoToStep(9)),
            CallbackCommand::Flow(FlowAction::Overview),
            CallbackCommand::Flow(FlowAction::Confirm),
            CallbackCommand::Flow(FlowAction::EditField(4)),
            CallbackCommand::Admin(AdminAction::Panel),
            CallbackCommand::Admin(AdminAction::AddDistrict(5)),
            CallbackCommand::Admin(AdminAction::ToggleSlot(2)),
            CallbackCommand::Admin(AdminAction::Approve(31)),
            CallbackCommand::Noop,
        ];

        for command in commands {
            let encoded = command.encode();
            assert!(encoded.len() <= 64, "too long: {}", encoded);
            let decoded = CallbackCommand::parse(&encoded).unwrap_or_else(|| panic!("no parse: {}", encoded));
            // FlowAction::Noop encodes to the shared "noop"
            if let CallbackCommand::Flow(FlowAction::Noop) = command {
                assert_eq!(decoded, CallbackCommand::Noop);
            } else {
                assert_eq!(decoded, command);
            }
        }
    }

    #[test]
    fn test_slot_value_keeps_colon() {
        let encoded = CallbackCommand::Flow(FlowAction::PickSlot("20:00".to_string())).encode();
        assert_eq!(encoded, "bf:slot:20:00");
        assert_eq!(
            CallbackCommand::parse(&encoded),
            Some(CallbackCommand::Flow(FlowAction::PickSlot("20:00".to_string())))
        );
    }

    #[test]
    fn test_unknown_payloads_rejected() {
        for data in ["", "bf:", "bf:bogus:1", "adm:bogus", "mode:download", "bf:city:abc"] {
            assert_eq!(CallbackCommand::parse(data), None, "should reject {:?}", data);
        }
    }
}
