pub mod fixtures;

#[cfg(test)]
mod join_fanout_tests;
#[cfg(test)]
mod moderator_gate_tests;
#[cfg(test)]
mod observer_tests;
#[cfg(test)]
mod room_lifecycle_tests;
