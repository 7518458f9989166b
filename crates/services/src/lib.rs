#![forbid(unsafe_code)]

pub mod app_services;
pub mod callback;
pub mod error;
pub mod flashcards;
pub mod point_service;
pub mod progress_service;
pub mod word_service;

pub use learn_core::Clock;

pub use app_services::{AppServices, ServicesConfig};
pub use callback::{Callback, CallerScope, CallerToken, dispatch};
pub use error::{
    AppServicesError, FlashcardError, PointServiceError, ProgressServiceError, WordServiceError,
};
pub use flashcards::{Advance, CardOrder, FlashcardSession};
pub use point_service::PointService;
pub use progress_service::{
    LearnUpdate, ProgressKeying, ProgressService, ProgressServiceConfig, UpdateStrategy,
};
pub use word_service::{WordService, WordServiceConfig};
