use std::time::Instant;

use crate::{
    backend::{NewNote, Note, NotesBackend},
    dialogue::{Dialogue, SessionKey, SessionStore},
    telegram::{BotCommand, ChatId, UserId},
};

const HELP: &str = "Команды по работе с заметками доступны в 'Меню': /notes, /newnote, /findnote, /cancel.";
const NO_TAGS: &str = "нет";

/// Telegram rejects `sendMessage` texts longer than this many UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Notes,
    NewNote,
    FindNote,
    Cancel,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "notes" => Some(Self::Notes),
            "newnote" => Some(Self::NewNote),
            "findnote" => Some(Self::FindNote),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// The command menu shown by Telegram clients.
pub fn commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Начать работу"),
        BotCommand::new("notes", "Получить список заметок"),
        BotCommand::new("newnote", "Создать новую заметку"),
        BotCommand::new("findnote", "Найти заметку по тегу"),
        BotCommand::new("cancel", "Отменить текущее действие"),
    ]
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Command(Command),
    UnknownCommand,
    Text(&'a str),
}

/// `/cmd@botname args` is a command; everything else is text.
pub fn parse_input(text: &str) -> Input<'_> {
    let text = text.trim();
    let Some(command) = text.strip_prefix('/') else {
        return Input::Text(text);
    };

    let name = command.split_whitespace().next().unwrap_or_default();
    let name = name.split('@').next().unwrap_or_default();

    match Command::from_name(&name.to_lowercase()) {
        Some(command) => Input::Command(command),
        None => Input::UnknownCommand,
    }
}

/// Comma separated, trimmed, blanks dropped.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Like [`parse_tags`], but a lone "нет" means no tags at all.
pub fn parse_note_tags(input: &str) -> Vec<String> {
    if input.trim().to_lowercase() == NO_TAGS {
        return vec![];
    }
    parse_tags(input)
}

pub fn format_note(note: &Note) -> String {
    let tags = if note.tags.is_empty() {
        NO_TAGS.to_owned()
    } else {
        note.tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
    };
    format!("Заметка: {}\n{}\nТеги: {}", note.title, note.content, tags)
}

/// Cuts a reply into sendable pieces, breaking at the last newline that fits.
pub fn split_message(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    while rest.encode_utf16().count() > MESSAGE_LIMIT {
        let mut end = 0;
        let mut units = 0;
        for (i, ch) in rest.char_indices() {
            units += ch.len_utf16();
            if units > MESSAGE_LIMIT {
                break;
            }
            end = i + ch.len_utf8();
        }
        let cut = rest[..end].rfind('\n').map_or(end, |i| i + 1);
        let part = rest[..cut].trim_end_matches('\n');
        if !part.is_empty() {
            parts.push(part.to_owned());
        }
        rest = &rest[cut..];
    }
    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_owned());
    }
    parts
}

pub struct Bot<B> {
    backend: B,
    sessions: SessionStore,
}

impl<B> Bot<B>
where
    B: NotesBackend,
{
    pub fn new(backend: B, sessions: SessionStore) -> Self {
        Self { backend, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles one inbound text message and returns the replies, in order,
    /// each short enough for a single `sendMessage`.
    pub async fn handle(&self, chat_id: ChatId, user_id: UserId, text: &str, now: Instant) -> Vec<String> {
        let replies = match parse_input(text) {
            Input::Command(command) => self.command(chat_id, user_id, command, now).await,
            Input::UnknownCommand | Input::Text(_) => match self.sessions.take((chat_id, user_id), now) {
                Some(dialogue) => self.step(chat_id, user_id, dialogue, text.trim(), now).await,
                None => vec![HELP.into()],
            },
        };
        replies.iter().flat_map(|reply| split_message(reply)).collect()
    }

    async fn command(&self, chat_id: ChatId, user_id: UserId, command: Command, now: Instant) -> Vec<String> {
        tracing::debug!(chat_id, user_id, ?command, "command");
        let key = (chat_id, user_id);

        match command {
            Command::Start => {
                self.sessions.finish(key, now);
                vec![self.start(user_id).await]
            }
            Command::Notes => {
                self.sessions.finish(key, now);
                self.list_notes(user_id).await
            }
            Command::NewNote => {
                self.sessions.begin(key, Dialogue::WaitingForTitle, now);
                vec!["Введите заголовок новой заметки.".into()]
            }
            Command::FindNote => {
                self.sessions.begin(key, Dialogue::SearchingByTags, now);
                vec!["Введите теги для поиска (через запятую).".into()]
            }
            Command::Cancel => {
                if self.sessions.finish(key, now) {
                    vec!["Действие отменено.".into()]
                } else {
                    vec!["Нет активного действия.".into()]
                }
            }
        }
    }

    async fn start(&self, user_id: UserId) -> String {
        match self.backend.login(user_id).await {
            Ok(Some(account)) => {
                return format!(
                    "Привет, {}!\nВы авторизованы и можете получать список заметок, или создавать новые. \
                    Команды по работе с заметками доступны в 'Меню'.",
                    account.telegram_id.unwrap_or(user_id)
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id, "telegram login failed: {e}"),
        }

        match self.backend.register(user_id).await {
            Ok(account) => {
                tracing::info!(user_id, account_id = account.id, "user registered");
                "Поздравляем, Вы зарегистрировались в приложении 'Мои заметки'! \
                Команды по работе с заметками доступны в 'Меню'."
                    .into()
            }
            Err(e) => {
                tracing::warn!(user_id, "registration failed: {e}");
                "Произошла ошибка при регистрации. Попробуйте снова позже.".into()
            }
        }
    }

    async fn list_notes(&self, user_id: UserId) -> Vec<String> {
        match self.backend.list_notes(user_id).await {
            Ok(notes) if notes.is_empty() => vec!["У вас нет заметок.".into()],
            Ok(notes) => notes.iter().map(format_note).collect(),
            Err(e) => {
                tracing::warn!(user_id, "listing notes failed: {e}");
                vec!["Ошибка при получении заметок.".into()]
            }
        }
    }

    /// One step of an active flow. The session was already taken out of the store,
    /// so returning without `advance` ends the flow.
    async fn step(&self, chat_id: ChatId, user_id: UserId, dialogue: Dialogue, text: &str, now: Instant) -> Vec<String> {
        let key: SessionKey = (chat_id, user_id);
        match dialogue {
            Dialogue::WaitingForTitle if text.is_empty() => {
                self.sessions.advance(key, Dialogue::WaitingForTitle, now);
                vec!["Заголовок не может быть пустым. Введите заголовок новой заметки.".into()]
            }
            Dialogue::WaitingForTitle => {
                self.sessions
                    .advance(key, Dialogue::WaitingForContent { title: text.into() }, now);
                vec!["Теперь введите содержание заметки.".into()]
            }
            Dialogue::WaitingForContent { title } => {
                self.sessions.advance(
                    key,
                    Dialogue::WaitingForTags {
                        title,
                        content: text.into(),
                    },
                    now,
                );
                vec!["Теперь введите теги для заметки (через запятую) или введите 'нет', если теги не нужны.".into()]
            }
            Dialogue::WaitingForTags { title, content } => {
                let note = NewNote {
                    title,
                    content,
                    tags: parse_note_tags(text),
                };
                match self.backend.create_note(user_id, note).await {
                    Ok(note) => {
                        tracing::info!(chat_id, note_id = note.id, "note created");
                        vec!["Заметка успешно создана!".into()]
                    }
                    Err(e) => {
                        tracing::warn!(chat_id, "creating note failed: {e}");
                        vec!["Ошибка при создании заметки.".into()]
                    }
                }
            }
            Dialogue::SearchingByTags => {
                let tags = parse_tags(text);
                if tags.is_empty() {
                    self.sessions.advance(key, Dialogue::SearchingByTags, now);
                    return vec!["Введите хотя бы один тег (через запятую).".into()];
                }

                match self.backend.search_notes(user_id, &tags).await {
                    Ok(notes) if notes.is_empty() => vec!["Заметки с такими тегами не найдены.".into()],
                    Ok(notes) => notes.iter().map(format_note).collect(),
                    Err(e) => {
                        tracing::warn!(chat_id, "searching notes failed: {e}");
                        vec!["Ошибка при поиске заметок.".into()]
                    }
                }
            }
        }
    }
}
