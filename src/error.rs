//! error: типизированные виды ошибок QuiverCkpt.
//!
//! Публичный API возвращает anyhow::Result (как и весь остальной код), а вид ошибки
//! переносится внутри anyhow::Error как CkptError. Классификация на стороне
//! вызывающего кода: через error_kind(&err).

use thiserror::Error;

/// Ошибки движка чекпоинтов.
#[derive(Debug, Error)]
pub enum CkptError {
    /// Некорректный слайс/имя/буфер/аргументы.
    #[error("validation error: {0}")]
    Validation(String),

    /// Расхождение формы или типа с уже зарегистрированными фрагментами.
    #[error("shape/type mismatch for tensor '{name}': {detail}")]
    ShapeOrTypeMismatch { name: String, detail: String },

    /// Тензор отсутствует в индексе.
    #[error("tensor not found: {0}")]
    NotFound(String),

    /// Повреждённый или неизвестный формат файла/записи.
    #[error("bad checkpoint format: {0}")]
    Format(String),
}

/// Грубая классификация ошибки для вызывающего кода.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ShapeOrTypeMismatch,
    NotFound,
    Format,
    Io,
    Other,
}

impl CkptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CkptError::Validation(_) => ErrorKind::Validation,
            CkptError::ShapeOrTypeMismatch { .. } => ErrorKind::ShapeOrTypeMismatch,
            CkptError::NotFound(_) => ErrorKind::NotFound,
            CkptError::Format(_) => ErrorKind::Format,
        }
    }
}

/// Определить вид ошибки: сначала ищем CkptError в цепочке, затем std::io::Error.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CkptError>() {
            return e.kind();
        }
    }
    for cause in err.chain() {
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return ErrorKind::Io;
        }
    }
    ErrorKind::Other
}

// Короткие конструкторы (используются по всему крейту).

pub(crate) fn validation(msg: impl Into<String>) -> anyhow::Error {
    CkptError::Validation(msg.into()).into()
}

pub(crate) fn format_err(msg: impl Into<String>) -> anyhow::Error {
    CkptError::Format(msg.into()).into()
}

pub(crate) fn mismatch(name: &str, detail: impl Into<String>) -> anyhow::Error {
    CkptError::ShapeOrTypeMismatch {
        name: name.to_string(),
        detail: detail.into(),
    }
    .into()
}
