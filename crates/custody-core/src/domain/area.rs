//! Holding areas, holding cells, and the physical storage containers that
//! back possession containment.

use super::errors::CustodyError;
use super::items::Item;
use super::subject::{Subject, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A position in the simulated environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Axis-aligned spatial bounds of a holding area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min: Point,
    pub max: Point,
}

impl Region {
    #[must_use]
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Whether the point lies inside the bounds (inclusive).
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

/// A physical storage container with a fixed number of slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    slots: Vec<Option<Item>>,
}

impl Container {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the first free slot, if any.
    #[must_use]
    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Place an item into the first free slot. Returns the item back when
    /// the container is full.
    pub fn try_add(&mut self, item: Item) -> Result<(), Item> {
        match self.first_empty() {
            Some(i) => {
                self.slots[i] = Some(item);
                Ok(())
            }
            None => Err(item),
        }
    }

    /// The items currently stored, in slot order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Remove and return every stored item, leaving the container empty.
    pub fn take_all(&mut self) -> Vec<Item> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

/// A capacity-1 sub-unit of a holding area, optionally backed by a physical
/// storage container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HoldingCell {
    name: String,
    entry_point: Point,
    container: Option<Container>,
    occupant: Option<Subject>,
}

impl HoldingCell {
    #[must_use]
    pub fn new(name: impl Into<String>, entry_point: Point) -> Self {
        Self {
            name: name.into(),
            entry_point,
            container: None,
            occupant: None,
        }
    }

    /// Attach a storage container with the given slot count.
    #[must_use]
    pub fn with_container(mut self, capacity: usize) -> Self {
        self.container = Some(Container::new(capacity));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_point(&self) -> Point {
        self.entry_point
    }

    pub fn has_container(&self) -> bool {
        self.container.is_some()
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn container_mut(&mut self) -> Option<&mut Container> {
        self.container.as_mut()
    }

    pub fn has_occupant(&self) -> bool {
        self.occupant.is_some()
    }

    pub fn occupant(&self) -> Option<&Subject> {
        self.occupant.as_ref()
    }

    pub fn occupant_mut(&mut self) -> Option<&mut Subject> {
        self.occupant.as_mut()
    }

    /// Place a subject into the cell. The caller checks occupancy first;
    /// placing into an occupied cell replaces the previous record.
    pub fn set_occupant(&mut self, subject: Subject) {
        self.occupant = Some(subject);
    }

    /// Remove and return the occupant, if any.
    pub fn take_occupant(&mut self) -> Option<Subject> {
        self.occupant.take()
    }

    /// Split borrow of the container and occupant slots, for containment
    /// rules that mutate both.
    pub fn container_and_occupant_mut(
        &mut self,
    ) -> (Option<&mut Container>, Option<&mut Subject>) {
        (self.container.as_mut(), self.occupant.as_mut())
    }
}

/// A top-level confinement zone: an ordered set of cells plus an unbounded
/// general-population slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HoldingArea {
    name: String,
    bounds: Region,
    entry_point: Point,
    release_point: Point,
    free_point: Point,
    enabled: bool,
    cells: Vec<HoldingCell>,
    population: HashMap<SubjectId, Subject>,
}

impl HoldingArea {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        bounds: Region,
        entry_point: Point,
        release_point: Point,
        free_point: Point,
    ) -> Self {
        Self {
            name: name.into(),
            bounds,
            entry_point,
            release_point,
            free_point,
            enabled: true,
            cells: Vec::new(),
            population: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> Region {
        self.bounds
    }

    pub fn entry_point(&self) -> Point {
        self.entry_point
    }

    pub fn release_point(&self) -> Point {
        self.release_point
    }

    pub fn free_point(&self) -> Point {
        self.free_point
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Append a cell. Cells keep their defined order; "any empty cell"
    /// resolution scans them in this order.
    pub fn add_cell(&mut self, cell: HoldingCell) {
        self.cells.push(cell);
    }

    pub fn cells(&self) -> &[HoldingCell] {
        &self.cells
    }

    pub fn has_cells(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Look up a cell by name, case-insensitively.
    pub fn cell(&self, name: &str) -> Option<&HoldingCell> {
        self.cells.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn cell_mut(&mut self, name: &str) -> Option<&mut HoldingCell> {
        self.cells
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The first unoccupied cell in defined order.
    pub fn first_empty_cell(&self) -> Option<&HoldingCell> {
        self.cells.iter().find(|c| !c.has_occupant())
    }

    pub fn first_empty_cell_mut(&mut self) -> Option<&mut HoldingCell> {
        self.cells.iter_mut().find(|c| !c.has_occupant())
    }

    /// Remove a cell by name. Refused while the cell holds a subject.
    pub fn remove_cell(&mut self, name: &str) -> Result<HoldingCell, CustodyError> {
        let index = self
            .cells
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CustodyError::CellUnavailable {
                area: self.name.clone(),
                cell: name.to_owned(),
            })?;

        if self.cells[index].has_occupant() {
            return Err(CustodyError::CellNotEmpty {
                name: self.cells[index].name.clone(),
            });
        }

        Ok(self.cells.remove(index))
    }

    /// Place a subject into the general population.
    pub fn add_to_population(&mut self, subject: Subject) {
        self.population.insert(subject.id(), subject);
    }

    /// Whether the identity is tracked by this area, in a cell or in the
    /// general population.
    pub fn contains_subject(&self, id: SubjectId) -> bool {
        self.population.contains_key(&id)
            || self
                .cells
                .iter()
                .any(|c| c.occupant().is_some_and(|s| s.id() == id))
    }

    /// Name of the cell the identity occupies, if it is not in the general
    /// population.
    pub fn cell_of(&self, id: SubjectId) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.occupant().is_some_and(|s| s.id() == id))
            .map(|c| c.name.as_str())
    }

    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.population.get(&id).or_else(|| {
            self.cells
                .iter()
                .filter_map(|c| c.occupant())
                .find(|s| s.id() == id)
        })
    }

    pub fn subject_mut(&mut self, id: SubjectId) -> Option<&mut Subject> {
        if self.population.contains_key(&id) {
            return self.population.get_mut(&id);
        }
        self.cells
            .iter_mut()
            .filter_map(|c| c.occupant_mut())
            .find(|s| s.id() == id)
    }

    /// Detach a subject from wherever it is held, returning the record and
    /// the name of the cell it occupied (`None` for general population).
    pub fn detach_subject(&mut self, id: SubjectId) -> Option<(Subject, Option<String>)> {
        if let Some(subject) = self.population.remove(&id) {
            return Some((subject, None));
        }
        for cell in &mut self.cells {
            if cell.occupant().is_some_and(|s| s.id() == id) {
                let name = cell.name.clone();
                return cell.take_occupant().map(|s| (s, Some(name)));
            }
        }
        None
    }

    /// Every subject held by this area, cells first then general population.
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.cells
            .iter()
            .filter_map(|c| c.occupant())
            .chain(self.population.values())
    }

    pub fn subjects_mut(&mut self) -> impl Iterator<Item = &mut Subject> {
        self.cells
            .iter_mut()
            .filter_map(|c| c.occupant_mut())
            .chain(self.population.values_mut())
    }

    /// Total number of subjects held by this area.
    pub fn total_confined(&self) -> usize {
        self.population.len() + self.cells.iter().filter(|c| c.has_occupant()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn area() -> HoldingArea {
        let mut a = HoldingArea::new(
            "east",
            Region::new(Point::new(0.0, 0.0, 0.0), Point::new(100.0, 64.0, 100.0)),
            Point::new(50.0, 10.0, 50.0),
            Point::new(52.0, 10.0, 50.0),
            Point::new(120.0, 10.0, 50.0),
        );
        a.add_cell(HoldingCell::new("c1", Point::new(10.0, 10.0, 10.0)).with_container(4));
        a.add_cell(HoldingCell::new("c2", Point::new(20.0, 10.0, 10.0)));
        a
    }

    fn subject() -> Subject {
        Subject::new(Uuid::new_v4(), "vex", 60_000)
    }

    #[test]
    fn test_region_contains() {
        let r = Region::new(Point::new(0.0, 0.0, 0.0), Point::new(10.0, 10.0, 10.0));
        assert!(r.contains(Point::new(5.0, 5.0, 5.0)));
        assert!(r.contains(Point::new(0.0, 0.0, 0.0)));
        assert!(!r.contains(Point::new(11.0, 5.0, 5.0)));
    }

    #[test]
    fn test_container_first_free_slot_insertion() {
        let mut c = Container::new(2);
        assert_eq!(c.first_empty(), Some(0));
        c.try_add(Item::new("bread", 1)).unwrap();
        assert_eq!(c.first_empty(), Some(1));
        c.try_add(Item::new("rope", 1)).unwrap();

        let overflow = c.try_add(Item::new("lantern", 1));
        assert_eq!(overflow.unwrap_err().kind, "lantern");
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_container_take_all_clears() {
        let mut c = Container::new(3);
        c.try_add(Item::new("bread", 1)).unwrap();
        c.try_add(Item::new("rope", 2)).unwrap();

        let items = c.take_all();
        assert_eq!(items.len(), 2);
        assert!(c.is_empty());
    }

    #[test]
    fn test_cell_lookup_is_case_insensitive() {
        let a = area();
        assert!(a.cell("C1").is_some());
        assert!(a.cell("c3").is_none());
    }

    #[test]
    fn test_first_empty_cell_scans_defined_order() {
        let mut a = area();
        assert_eq!(a.first_empty_cell().unwrap().name(), "c1");

        a.cell_mut("c1").unwrap().set_occupant(subject());
        assert_eq!(a.first_empty_cell().unwrap().name(), "c2");

        a.cell_mut("c2").unwrap().set_occupant(subject());
        assert!(a.first_empty_cell().is_none());
    }

    #[test]
    fn test_subject_lookup_across_cells_and_population() {
        let mut a = area();
        let in_cell = subject();
        let in_pop = subject();
        let cell_id = in_cell.id();
        let pop_id = in_pop.id();

        a.cell_mut("c1").unwrap().set_occupant(in_cell);
        a.add_to_population(in_pop);

        assert!(a.contains_subject(cell_id));
        assert!(a.contains_subject(pop_id));
        assert_eq!(a.cell_of(cell_id), Some("c1"));
        assert_eq!(a.cell_of(pop_id), None);
        assert_eq!(a.total_confined(), 2);
    }

    #[test]
    fn test_detach_subject_from_cell() {
        let mut a = area();
        let s = subject();
        let id = s.id();
        a.cell_mut("c1").unwrap().set_occupant(s);

        let (detached, cell) = a.detach_subject(id).unwrap();
        assert_eq!(detached.id(), id);
        assert_eq!(cell.as_deref(), Some("c1"));
        assert!(!a.contains_subject(id));
        assert!(!a.cell("c1").unwrap().has_occupant());
    }

    #[test]
    fn test_detach_subject_from_population() {
        let mut a = area();
        let s = subject();
        let id = s.id();
        a.add_to_population(s);

        let (_, cell) = a.detach_subject(id).unwrap();
        assert_eq!(cell, None);
        assert_eq!(a.total_confined(), 0);
    }

    #[test]
    fn test_remove_cell_refused_while_occupied() {
        let mut a = area();
        a.cell_mut("c1").unwrap().set_occupant(subject());

        let err = a.remove_cell("c1").unwrap_err();
        assert!(matches!(err, CustodyError::CellNotEmpty { .. }));

        let id = a.cell("c1").unwrap().occupant().unwrap().id();
        a.detach_subject(id);
        assert!(a.remove_cell("c1").is_ok());
    }

    #[test]
    fn test_remove_missing_cell_is_unavailable() {
        let mut a = area();
        let err = a.remove_cell("c9").unwrap_err();
        assert!(matches!(err, CustodyError::CellUnavailable { .. }));
    }
}
