//! The static step table
//!
//! One entry per dialog step: prompt text, expected input kind and where
//! its options come from. The interpreter in `flow.rs` is generic over
//! this table.

/// First real step after binding-code redemption.
pub const STEP_FIRST: u8 = 1;
/// Media collection step.
pub const STEP_MEDIA: u8 = 10;
/// Pseudo-step: the progress overview / final confirmation panel.
pub const STEP_CONFIRM: u8 = 11;

/// Where a choice step's buttons come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsSource {
    /// Fixed (label, value) pairs
    Static(&'static [(&'static str, &'static str)]),
    /// Active cities query
    Cities,
    /// Districts of the city chosen at step 2
    Districts,
    /// Active keywords, multi-select
    Keywords,
    /// Next 5 calendar dates, then admin-configured time slots
    PublishSchedule,
}

/// Free-text steps, each with its own validator in `core::validation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    PPrice,
    PpPrice,
    AdvSentence,
    ChannelUsername,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Choice(OptionsSource),
    Text(TextField),
    Media,
}

#[derive(Debug, Clone, Copy)]
pub struct StepDef {
    pub number: u8,
    pub title: &'static str,
    pub prompt: &'static str,
    pub kind: InputKind,
}

pub const MERCHANT_TYPE_OPTIONS: &[(&str, &str)] =
    &[("👩‍🏫 老师", "teacher"), ("🏢 商家", "business")];

pub const STEPS: [StepDef; 10] = [
    StepDef {
        number: 1,
        title: "👥 步骤 1/10: 选择商户类型",
        prompt: "请选择您提供的服务类型：",
        kind: InputKind::Choice(OptionsSource::Static(MERCHANT_TYPE_OPTIONS)),
    },
    StepDef {
        number: 2,
        title: "🏙️ 步骤 2/10: 选择城市",
        prompt: "请选择您所在的城市：",
        kind: InputKind::Choice(OptionsSource::Cities),
    },
    StepDef {
        number: 3,
        title: "🌆 步骤 3/10: 选择地区",
        prompt: "请选择您所在的地区：",
        kind: InputKind::Choice(OptionsSource::Districts),
    },
    StepDef {
        number: 4,
        title: "💰 步骤 4/10: 输入P价格",
        prompt: "请输入您的P价格（数字）：",
        kind: InputKind::Text(TextField::PPrice),
    },
    StepDef {
        number: 5,
        title: "💎 步骤 5/10: 输入PP价格",
        prompt: "请输入您的PP价格（数字）：",
        kind: InputKind::Text(TextField::PpPrice),
    },
    StepDef {
        number: 6,
        title: "📝 步骤 6/10: 一句话优势",
        prompt: "请输入你的一句话优势（建议≤30字）：",
        kind: InputKind::Text(TextField::AdvSentence),
    },
    StepDef {
        number: 7,
        title: "📢 步骤 7/10: 发布频道用户名",
        prompt: "请输入你的频道用户名（例如 @yourchannel 或 t.me/yourchannel）：",
        kind: InputKind::Text(TextField::ChannelUsername),
    },
    StepDef {
        number: 8,
        title: "🏷️ 步骤 8/10: 选择关键词",
        prompt: "请选择相关的服务关键词（最多3个，点击可取消）：",
        kind: InputKind::Choice(OptionsSource::Keywords),
    },
    StepDef {
        number: 9,
        title: "🗓️ 步骤 9/10: 选择发布时间",
        prompt: "请选择希望发布的日期与固定时间（由管理员配置）",
        kind: InputKind::Choice(OptionsSource::PublishSchedule),
    },
    StepDef {
        number: 10,
        title: "📷 步骤 10/10: 上传媒体",
        prompt: "请直接发送照片或视频给我（需要6个）。完成后点击下方“完成上传”。",
        kind: InputKind::Media,
    },
];

/// Looks up a step definition by number.
pub fn step(number: u8) -> Option<&'static StepDef> {
    STEPS.get(number.checked_sub(1)? as usize)
}
