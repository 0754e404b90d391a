pub mod classifications;
pub mod health;
pub mod rules;
pub mod taxonomies;
pub mod taxons;
