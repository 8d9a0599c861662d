pub mod broadcast;
pub mod collab_service;
pub mod presence;
pub mod quiz_service;
pub mod result_service;
pub mod scoring_service;
pub mod session_service;
