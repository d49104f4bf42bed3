pub mod dish;
pub mod similarity_response;

pub use dish::{DishListing, DishRecord};
pub use similarity_response::{
    MatchMethod, NameMatch, NameMatchResponse, RankedDish, SimilarityResponse,
};
