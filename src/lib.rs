pub mod blob;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod notify;
pub mod server;
pub mod subscription;

// Re-export main types for convenience
pub use blob::{BlobKey, BlobObject, BlobStore, FsBlobStore};
pub use catalog::{
    Catalog, CatalogRepository, Comment, Episode, EpisodeRecord, Mutation, MutationOutcome,
};
pub use config::{Config, Settings};
pub use document::{DocumentStore, GithubDocumentStore, MemoryDocumentStore, Revision};
pub use error::{
    ApiError, BlobError, CatalogError, ConfigError, DeliveryError, StoreError, SubscriptionError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use notify::{EpisodeSummary, FanoutReport, Notifier, PushSender, WebPushSender};
pub use server::{AppState, Backend, build_router};
pub use subscription::{Subscription, SubscriptionStore};
