// ABOUTME: Transport-neutral API layer: the event operations and the reply they produce.
// ABOUTME: HTTP routes and the function handler are thin adapters over this module.

pub mod events;
pub mod reply;
