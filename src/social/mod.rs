pub mod domain;
pub mod repository;

pub use domain::{LikeStatus, LikeTarget, PostOrdering, ValidationError};
pub use repository::{
    DynSocialRepository, RepositoryError, SocialRepository, SqliteSocialRepository,
};
