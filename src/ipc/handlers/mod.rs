pub mod applications;
pub mod assets;
pub mod attendance;
pub mod auth;
pub mod backup;
pub mod core;
pub mod fees;
pub mod media;
pub mod nav;
pub mod notices;
pub mod pages;
pub mod people;
pub mod routines;
pub mod site;
pub mod students;
pub mod users;
pub mod widgets;
