mod helpers;
mod matches;
mod wallet;
