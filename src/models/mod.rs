pub mod audit;
pub mod bayanihan;
pub mod listing;
pub mod review_form;
pub mod syllabus;
pub mod tos;
pub mod user;
pub mod workflow;
