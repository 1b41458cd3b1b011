//! [`ChatTransport`] over the Telegram Bot API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto, MessageId, ParseMode};
use teloxide::RequestError;
use tokio::fs::File as TokioFile;

use dropcore::pipeline::{ChatTransport, MediaUpload, MessageRef, ProgressReader, TransportError, UploadKind, UploadProgress};

pub struct TeloxideTransport {
    bot: Bot,
    /// Keyboards re-sent with every edit of their message, so that edits
    /// made by the pipeline do not strip them.
    keyboards: DashMap<MessageRef, InlineKeyboardMarkup>,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            keyboards: DashMap::new(),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Keeps `markup` on `message` across edits until [`Self::release_keyboard`].
    pub fn attach_keyboard(&self, message: MessageRef, markup: InlineKeyboardMarkup) {
        self.keyboards.insert(message, markup);
    }

    /// Stops re-sending the keyboard of `message` and removes it from the chat.
    pub async fn release_keyboard(&self, message: MessageRef) {
        if self.keyboards.remove(&message).is_none() {
            return;
        }
        let result = self
            .bot
            .edit_message_reply_markup(ChatId(message.chat_id), MessageId(message.message_id))
            .await;
        if let Err(e) = result {
            if !is_not_modified(&e) {
                log::warn!("Failed to remove keyboard from message {}: {}", message.message_id, e);
            }
        }
    }
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
    }
}

fn is_not_modified(err: &RequestError) -> bool {
    err.to_string().contains("message is not modified")
}

fn transport_error(err: RequestError) -> TransportError {
    match err {
        RequestError::Api(api) => TransportError::Api(api.to_string()),
        other => TransportError::Network(other.to_string()),
    }
}

/// Creates an `InputFile` that feeds `progress` as the body is streamed.
async fn input_file_with_progress(path: &Path, progress: UploadProgress) -> Result<InputFile, TransportError> {
    let file = TokioFile::open(path).await?;
    let mut input_file = InputFile::read(ProgressReader::new(file, progress));
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        input_file = input_file.file_name(name.to_string());
    }
    Ok(input_file)
}

#[async_trait]
impl ChatTransport for TeloxideTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, TransportError> {
        let msg = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(transport_error)?;
        Ok(message_ref(&msg))
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        let markup = self.keyboards.get(&message).map(|m| m.value().clone());
        let mut request = self
            .bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(transport_error(e)),
        }
    }

    async fn send_media(
        &self,
        chat_id: i64,
        upload: &MediaUpload,
        progress: UploadProgress,
    ) -> Result<MessageRef, TransportError> {
        let input = input_file_with_progress(&upload.path, progress).await?;
        let chat_id = ChatId(chat_id);

        let msg = match upload.kind {
            UploadKind::Video => {
                let mut request = self
                    .bot
                    .send_video(chat_id, input)
                    .caption(upload.caption.clone())
                    .parse_mode(ParseMode::Html)
                    .supports_streaming(true);
                if let Some(duration) = upload.duration {
                    request = request.duration(duration);
                }
                if let Some(width) = upload.width {
                    request = request.width(width);
                }
                if let Some(height) = upload.height {
                    request = request.height(height);
                }
                if let Some(thumbnail) = &upload.thumbnail {
                    request = request.thumbnail(InputFile::file(thumbnail.clone()));
                }
                request.await
            }
            UploadKind::Document => {
                let mut request = self
                    .bot
                    .send_document(chat_id, input)
                    .caption(upload.caption.clone())
                    .parse_mode(ParseMode::Html);
                if let Some(thumbnail) = &upload.thumbnail {
                    request = request.thumbnail(InputFile::file(thumbnail.clone()));
                }
                request.await
            }
        }
        .map_err(transport_error)?;

        Ok(message_ref(&msg))
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        photos: &[PathBuf],
        caption: Option<&str>,
    ) -> Result<Vec<MessageRef>, TransportError> {
        // Telegram send_media_group requires 2-10 items
        match photos {
            [] => Ok(Vec::new()),
            [single] => {
                let mut request = self.bot.send_photo(ChatId(chat_id), InputFile::file(single.clone()));
                if let Some(caption) = caption {
                    request = request.caption(caption).parse_mode(ParseMode::Html);
                }
                let msg = request.await.map_err(transport_error)?;
                Ok(vec![message_ref(&msg)])
            }
            _ => {
                let media: Vec<InputMedia> = photos
                    .iter()
                    .enumerate()
                    .map(|(i, path)| {
                        let mut photo = InputMediaPhoto::new(InputFile::file(path.clone()));
                        if let (0, Some(caption)) = (i, caption) {
                            photo = photo.caption(caption).parse_mode(ParseMode::Html);
                        }
                        InputMedia::Photo(photo)
                    })
                    .collect();
                let messages = self
                    .bot
                    .send_media_group(ChatId(chat_id), media)
                    .await
                    .map_err(transport_error)?;
                Ok(messages.iter().map(message_ref).collect())
            }
        }
    }

    async fn download_media(&self, file_ref: &str, dest: &Path) -> Result<PathBuf, TransportError> {
        let file = self
            .bot
            .get_file(FileId(file_ref.to_string()))
            .await
            .map_err(transport_error)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut dst = TokioFile::create(dest).await?;
        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        log::debug!("Fetched {} to {}", file.path, dest.display());
        Ok(dest.to_path_buf())
    }
}
