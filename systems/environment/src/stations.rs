//! Stations: addressable observation points, one per stack.
//!
//! A station is bound to the stable identifier of its stack rather than to a
//! list position, so inserting or removing stacks cannot desynchronise the two.
//! Cyclic station order is derived from the world's stack order.

use std::collections::BTreeMap;

use blocks_world_core::{Event, StackId, StationLabel};
use blocks_world_world::World;

use crate::ProtocolError;

/// Registry binding every stack of the world to exactly one station.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stations {
    by_stack: BTreeMap<StackId, StationLabel>,
    by_label: BTreeMap<StationLabel, StackId>,
}

impl Stations {
    /// Labels the stacks of a freshly loaded world `#0`, `#1`, ... in world order.
    pub(crate) fn for_world(world: &World) -> Result<Self, ProtocolError> {
        let mut stations = Self::default();
        let mut discarded = Vec::new();
        stations.reconcile(world, &mut discarded)?;
        Ok(stations)
    }

    /// Brings the registry in line with the world's current stacks.
    ///
    /// Stations of vanished stacks are removed; every new stack receives the
    /// lowest unused label, in world order.
    pub(crate) fn reconcile(
        &mut self,
        world: &World,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ProtocolError> {
        let vanished: Vec<StackId> = self
            .by_stack
            .keys()
            .copied()
            .filter(|stack| world.stack_by_id(*stack).is_none())
            .collect();
        for stack in vanished {
            if let Some(station) = self.by_stack.remove(&stack) {
                let _ = self.by_label.remove(&station);
                out_events.push(Event::StationRemoved { station, stack });
            }
        }

        for stack in world.stacks() {
            let stack = stack.id();
            if self.by_stack.contains_key(&stack) {
                continue;
            }
            let station = self
                .lowest_unused()
                .ok_or(ProtocolError::StationLabelsExhausted)?;
            let _ = self.by_stack.insert(stack, station);
            let _ = self.by_label.insert(station, stack);
            out_events.push(Event::StationCreated { station, stack });
        }
        Ok(())
    }

    /// Fails when some stack lacks a station or some station lacks a stack.
    pub(crate) fn verify(&self, world: &World) -> Result<(), ProtocolError> {
        let aligned = self.by_stack.len() == world.stacks().len()
            && world
                .stacks()
                .iter()
                .all(|stack| self.by_stack.contains_key(&stack.id()));
        if aligned {
            Ok(())
        } else {
            Err(ProtocolError::StationsMisaligned {
                stations: self.by_stack.len(),
                stacks: world.stacks().len(),
            })
        }
    }

    fn lowest_unused(&self) -> Option<StationLabel> {
        let mut candidate = StationLabel::FIRST;
        while self.by_label.contains_key(&candidate) {
            candidate = candidate.successor()?;
        }
        Some(candidate)
    }

    /// Station observing the identified stack.
    #[must_use]
    pub fn label_of(&self, stack: StackId) -> Option<StationLabel> {
        self.by_stack.get(&stack).copied()
    }

    /// Stack observed from the station.
    #[must_use]
    pub fn stack_of(&self, station: StationLabel) -> Option<StackId> {
        self.by_label.get(&station).copied()
    }

    /// Reports whether the station currently exists.
    #[must_use]
    pub fn contains(&self, station: StationLabel) -> bool {
        self.by_label.contains_key(&station)
    }

    /// Number of stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    /// Reports whether there are no stations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Station labels in the world's stack order.
    #[must_use]
    pub fn ordered(&self, world: &World) -> Vec<StationLabel> {
        world
            .stacks()
            .iter()
            .filter_map(|stack| self.label_of(stack.id()))
            .collect()
    }

    /// Station of the first stack in world order.
    #[must_use]
    pub fn first(&self, world: &World) -> Option<StationLabel> {
        world
            .stacks()
            .first()
            .and_then(|stack| self.label_of(stack.id()))
    }

    /// Station that follows `station` in cyclic order.
    #[must_use]
    pub fn next_after(&self, world: &World, station: StationLabel) -> Option<StationLabel> {
        let stack = self.stack_of(station)?;
        let position = world.position(stack)?;
        let stacks = world.stacks();
        let next = stacks[(position + 1) % stacks.len()].id();
        self.label_of(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_world_core::Block;

    fn label(c: char) -> StationLabel {
        StationLabel::new(c)
    }

    #[test]
    fn fresh_world_is_labelled_in_order() {
        let world = World::parse("ABC\n").expect("valid grid");
        let stations = Stations::for_world(&world).expect("labels available");
        assert_eq!(stations.ordered(&world), vec![label('0'), label('1'), label('2')]);
        assert_eq!(stations.verify(&world), Ok(()));
    }

    #[test]
    fn next_after_wraps_around() {
        let world = World::parse("ABC\n").expect("valid grid");
        let stations = Stations::for_world(&world).expect("labels available");
        assert_eq!(stations.next_after(&world, label('0')), Some(label('1')));
        assert_eq!(stations.next_after(&world, label('2')), Some(label('0')));
        assert_eq!(stations.next_after(&world, label('9')), None);
    }

    #[test]
    fn reconcile_reuses_lowest_free_label() {
        let mut world = World::parse("ABC\n").expect("valid grid");
        let mut stations = Stations::for_world(&world).expect("labels available");
        let mut events = Vec::new();

        let first = world.stacks()[0].id();
        let _ = world.pick_up(Block::new('A')).expect("A is alone");
        stations
            .reconcile(&world, &mut events)
            .expect("labels available");
        assert_eq!(
            events,
            vec![Event::StationRemoved {
                station: label('0'),
                stack: first
            }]
        );

        let third = world.stacks()[1].id();
        let created = world
            .put_down(Block::new('A'), Some(third))
            .expect("A existed");
        events.clear();
        stations
            .reconcile(&world, &mut events)
            .expect("labels available");

        assert_eq!(stations.label_of(created), Some(label('0')));
        assert_eq!(stations.ordered(&world), vec![label('1'), label('0'), label('2')]);
        assert_eq!(stations.len(), world.stacks().len());
    }

    #[test]
    fn verify_detects_missing_station() {
        let mut world = World::parse("AB\n").expect("valid grid");
        let stations = Stations::for_world(&world).expect("labels available");
        let _ = world.pick_up(Block::new('A')).expect("A is alone");
        assert_eq!(
            stations.verify(&world),
            Err(ProtocolError::StationsMisaligned {
                stations: 2,
                stacks: 1
            })
        );
    }
}
