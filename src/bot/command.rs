//! Bot command and callback parsing.
//!
//! Commands arrive as message text (`/start abc123`), button presses as
//! callback data (`folder_12`, `page_1_root`).

use std::fmt;

/// A slash command sent to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`, optionally with a web login code.
    Start(Option<String>),
    /// `/help`
    Help,
    /// `/files`
    Files,
    /// `/stats`
    Stats,
    /// `/link <name>`; the name may be empty.
    Link(String),
    /// Anything else.
    Unknown(String),
}

/// Parse message text into a command.
///
/// Returns None for text that is not a command. A `@BotName` suffix on the
/// command word is ignored.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();
    let without_slash = trimmed.strip_prefix('/')?;

    let (word, args) = match without_slash.split_once(char::is_whitespace) {
        Some((word, args)) => (word, args.trim()),
        None => (without_slash, ""),
    };
    let name = word.split('@').next().unwrap_or(word).to_lowercase();

    let command = match name.as_str() {
        "start" => {
            let code = args.split_whitespace().next().map(str::to_string);
            BotCommand::Start(code)
        }
        "help" => BotCommand::Help,
        "files" => BotCommand::Files,
        "stats" => BotCommand::Stats,
        "link" => BotCommand::Link(args.to_string()),
        _ => BotCommand::Unknown(name),
    };
    Some(command)
}

/// Folder addressed by a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderTarget {
    /// Files outside any folder.
    Root,
    /// A folder by ID.
    Folder(i64),
}

impl FolderTarget {
    fn parse(value: &str) -> Option<Self> {
        if value == "root" {
            return Some(Self::Root);
        }
        value.parse().ok().map(Self::Folder)
    }
}

impl fmt::Display for FolderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderTarget::Root => write!(f, "root"),
            FolderTarget::Folder(id) => write!(f, "{id}"),
        }
    }
}

/// Action encoded in an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    ListFiles,
    Stats,
    Folder(FolderTarget),
    /// Zero-based page of a folder.
    Page { page: usize, folder: FolderTarget },
    File(i64),
    Link(i64),
    Delete(i64),
    Unknown(String),
}

impl CallbackAction {
    /// Parse callback data.
    pub fn parse(data: &str) -> Self {
        let parsed = match data {
            "list_files" => Some(Self::ListFiles),
            "stats" => Some(Self::Stats),
            _ => parse_prefixed(data),
        };
        parsed.unwrap_or_else(|| Self::Unknown(data.to_string()))
    }
}

fn parse_prefixed(data: &str) -> Option<CallbackAction> {
    let (prefix, rest) = data.split_once('_')?;
    match prefix {
        "folder" => FolderTarget::parse(rest).map(CallbackAction::Folder),
        "page" => {
            let (page, folder) = rest.split_once('_')?;
            Some(CallbackAction::Page {
                page: page.parse().ok()?,
                folder: FolderTarget::parse(folder)?,
            })
        }
        "file" => rest.parse().ok().map(CallbackAction::File),
        "link" => rest.parse().ok().map(CallbackAction::Link),
        "delete" => rest.parse().ok().map(CallbackAction::Delete),
        _ => None,
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::ListFiles => write!(f, "list_files"),
            CallbackAction::Stats => write!(f, "stats"),
            CallbackAction::Folder(folder) => write!(f, "folder_{folder}"),
            CallbackAction::Page { page, folder } => write!(f, "page_{page}_{folder}"),
            CallbackAction::File(id) => write!(f, "file_{id}"),
            CallbackAction::Link(id) => write!(f, "link_{id}"),
            CallbackAction::Delete(id) => write!(f, "delete_{id}"),
            CallbackAction::Unknown(data) => write!(f, "{data}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start(None)));
        assert_eq!(
            parse_command("/start web-code_42"),
            Some(BotCommand::Start(Some("web-code_42".to_string())))
        );
        assert_eq!(parse_command("/HELP"), Some(BotCommand::Help));
        assert_eq!(parse_command("/files@NIDriveBot"), Some(BotCommand::Files));
        assert_eq!(parse_command("  /stats  "), Some(BotCommand::Stats));
        assert_eq!(
            parse_command("/link  my report.pdf "),
            Some(BotCommand::Link("my report.pdf".to_string()))
        );
        assert_eq!(parse_command("/link"), Some(BotCommand::Link(String::new())));
        assert_eq!(
            parse_command("/dance"),
            Some(BotCommand::Unknown("dance".to_string()))
        );
        assert_eq!(parse_command("hello"), None);
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(CallbackAction::parse("list_files"), CallbackAction::ListFiles);
        assert_eq!(CallbackAction::parse("stats"), CallbackAction::Stats);
        assert_eq!(
            CallbackAction::parse("folder_root"),
            CallbackAction::Folder(FolderTarget::Root)
        );
        assert_eq!(
            CallbackAction::parse("folder_12"),
            CallbackAction::Folder(FolderTarget::Folder(12))
        );
        assert_eq!(
            CallbackAction::parse("page_2_7"),
            CallbackAction::Page {
                page: 2,
                folder: FolderTarget::Folder(7)
            }
        );
        assert_eq!(CallbackAction::parse("file_5"), CallbackAction::File(5));
        assert_eq!(CallbackAction::parse("link_5"), CallbackAction::Link(5));
        assert_eq!(CallbackAction::parse("delete_5"), CallbackAction::Delete(5));
    }

    #[test]
    fn test_parse_callback_unknown() {
        for data in ["", "folder_", "folder_abc", "page_x_root", "page_1", "file_", "zap_1"] {
            assert_eq!(
                CallbackAction::parse(data),
                CallbackAction::Unknown(data.to_string()),
                "{data}"
            );
        }
    }

    #[test]
    fn test_callback_data_matches_parser() {
        let action = CallbackAction::Page {
            page: 3,
            folder: FolderTarget::Root,
        };
        assert_eq!(action.to_string(), "page_3_root");
        assert_eq!(CallbackAction::parse(&action.to_string()), action);
        assert_eq!(CallbackAction::Delete(9).to_string(), "delete_9");
    }
}
