mod model;
mod mutation;
mod repository;

pub use model::{Catalog, Comment, Episode, EpisodePatch, EpisodeRecord};
pub use mutation::{Applied, Mutation};
pub use repository::{CatalogRepository, MutationOutcome};
