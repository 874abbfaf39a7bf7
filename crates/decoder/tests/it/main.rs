mod events;
mod magic;
mod properties;
mod storage;
mod suspend;
