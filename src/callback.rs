use crate::models::FeedbackFilter;

/// Telegram ограничивает callback_data 64 байтами
pub const MAX_CALLBACK_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    Toggle { field: String, value: String },
    Select { field: String, value: String },
    Goto(String),
    Save,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAction {
    Show,
    Languages,
    Interests,
    Availability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Menu,
    Stats,
    List { filter: FeedbackFilter, page: u32 },
    View { id: i64, filter: FeedbackFilter, page: u32 },
    Mark { id: i64, processed: bool, filter: FeedbackFilter, page: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    Editor { tag: String, action: EditorAction },
    Profile(ProfileAction),
    Admin(AdminAction),
}

fn filter_code(filter: FeedbackFilter) -> &'static str {
    match filter {
        FeedbackFilter::Unprocessed => "new",
        FeedbackFilter::All => "all",
    }
}

fn parse_filter(raw: &str) -> Option<FeedbackFilter> {
    match raw {
        "new" => Some(FeedbackFilter::Unprocessed),
        "all" => Some(FeedbackFilter::All),
        _ => None,
    }
}

impl CallbackData {
    pub fn editor(tag: &str, action: EditorAction) -> Self {
        Self::Editor {
            tag: tag.to_string(),
            action,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Editor { tag, action } => match action {
                EditorAction::Toggle { field, value } => format!("ed:{}:t:{}:{}", tag, field, value),
                EditorAction::Select { field, value } => format!("ed:{}:s:{}:{}", tag, field, value),
                EditorAction::Goto(step) => format!("ed:{}:g:{}", tag, step),
                EditorAction::Save => format!("ed:{}:save", tag),
                EditorAction::Cancel => format!("ed:{}:cancel", tag),
            },
            Self::Profile(action) => {
                let target = match action {
                    ProfileAction::Show => "show",
                    ProfileAction::Languages => "languages",
                    ProfileAction::Interests => "interests",
                    ProfileAction::Availability => "availability",
                };
                format!("pf:{}", target)
            }
            Self::Admin(action) => match action {
                AdminAction::Menu => "adm:menu".to_string(),
                AdminAction::Stats => "adm:stats".to_string(),
                AdminAction::List { filter, page } => format!("adm:list:{}:{}", filter_code(*filter), page),
                AdminAction::View { id, filter, page } => {
                    format!("adm:view:{}:{}:{}", id, filter_code(*filter), page)
                }
                AdminAction::Mark {
                    id,
                    processed,
                    filter,
                    page,
                } => format!(
                    "adm:mark:{}:{}:{}:{}",
                    id,
                    u8::from(*processed),
                    filter_code(*filter),
                    page
                ),
            },
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        match parts.as_slice() {
            ["ed", tag, rest @ ..] => {
                let action = match rest {
                    ["t", field, value] => EditorAction::Toggle {
                        field: field.to_string(),
                        value: value.to_string(),
                    },
                    ["s", field, value] => EditorAction::Select {
                        field: field.to_string(),
                        value: value.to_string(),
                    },
                    ["g", step] => EditorAction::Goto(step.to_string()),
                    ["save"] => EditorAction::Save,
                    ["cancel"] => EditorAction::Cancel,
                    _ => return None,
                };
                Some(Self::editor(tag, action))
            }
            ["pf", target] => {
                let action = match *target {
                    "show" => ProfileAction::Show,
                    "languages" => ProfileAction::Languages,
                    "interests" => ProfileAction::Interests,
                    "availability" => ProfileAction::Availability,
                    _ => return None,
                };
                Some(Self::Profile(action))
            }
            ["adm", "menu"] => Some(Self::Admin(AdminAction::Menu)),
            ["adm", "stats"] => Some(Self::Admin(AdminAction::Stats)),
            ["adm", "list", filter, page] => Some(Self::Admin(AdminAction::List {
                filter: parse_filter(filter)?,
                page: page.parse().ok()?,
            })),
            ["adm", "view", id, filter, page] => Some(Self::Admin(AdminAction::View {
                id: id.parse().ok()?,
                filter: parse_filter(filter)?,
                page: page.parse().ok()?,
            })),
            ["adm", "mark", id, processed, filter, page] => Some(Self::Admin(AdminAction::Mark {
                id: id.parse().ok()?,
                processed: match *processed {
                    "1" => true,
                    "0" => false,
                    _ => return None,
                },
                filter: parse_filter(filter)?,
                page: page.parse().ok()?,
            })),
            _ => None,
        }
    }
}
