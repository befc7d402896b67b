//! Explicit registry of holding areas.
//!
//! The registry has exclusive ownership of every [`HoldingArea`] (and
//! through them every cell and confined Subject). It is constructed by the
//! embedding application and injected into the confinement manager rather
//! than reached as ambient state.

use crate::domain::area::{HoldingArea, Point};
use crate::domain::errors::CustodyError;
use crate::domain::subject::{Subject, SubjectId};
use std::collections::HashMap;

/// Keyed store of holding areas, case-insensitive by name.
#[derive(Debug, Default)]
pub struct AreaRegistry {
    areas: HashMap<String, HoldingArea>,
}

impl AreaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Register an area, replacing any area with the same name.
    pub fn add_area(&mut self, area: HoldingArea) {
        self.areas.insert(area.name().to_lowercase(), area);
    }

    /// Remove an area. Refused while the area holds any subject.
    pub fn remove_area(&mut self, name: &str) -> Result<HoldingArea, CustodyError> {
        let key = name.to_lowercase();
        let area = self.areas.remove(&key).ok_or(CustodyError::AreaRequired {
            action: "removing a holding area",
        })?;

        let count = area.total_confined();
        if count > 0 {
            let name = area.name().to_owned();
            self.areas.insert(key, area);
            return Err(CustodyError::AreaNotEmpty { name, count });
        }

        Ok(area)
    }

    /// Look up an area by name, case-insensitively.
    pub fn area(&self, name: &str) -> Option<&HoldingArea> {
        self.areas.get(&name.to_lowercase())
    }

    pub fn area_mut(&mut self, name: &str) -> Option<&mut HoldingArea> {
        self.areas.get_mut(&name.to_lowercase())
    }

    /// Whether an area with this name exists.
    #[must_use]
    pub fn is_valid_area(&self, name: &str) -> bool {
        self.areas.contains_key(&name.to_lowercase())
    }

    pub fn areas(&self) -> impl Iterator<Item = &HoldingArea> {
        self.areas.values()
    }

    pub fn areas_mut(&mut self) -> impl Iterator<Item = &mut HoldingArea> {
        self.areas.values_mut()
    }

    /// All area names, sorted.
    #[must_use]
    pub fn area_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.areas.values().map(|a| a.name().to_owned()).collect();
        names.sort();
        names
    }

    /// Area names starting with the prefix, sorted. An empty prefix matches
    /// every area.
    #[must_use]
    pub fn areas_by_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut names: Vec<String> = self
            .areas
            .values()
            .map(|a| a.name().to_owned())
            .filter(|n| prefix.is_empty() || n.to_lowercase().starts_with(&prefix))
            .collect();
        names.sort();
        names
    }

    /// The area whose bounds contain the point, if any.
    pub fn area_from_point(&self, point: Point) -> Option<&HoldingArea> {
        self.areas.values().find(|a| a.bounds().contains(point))
    }

    /// Whether the point lies inside any area's bounds.
    #[must_use]
    pub fn is_inside_any_area(&self, point: Point) -> bool {
        self.area_from_point(point).is_some()
    }

    /// Whether the identity is tracked by any area.
    #[must_use]
    pub fn is_confined(&self, id: SubjectId) -> bool {
        self.areas.values().any(|a| a.contains_subject(id))
    }

    /// Name of the area tracking the identity, if any.
    pub fn area_of(&self, id: SubjectId) -> Option<&str> {
        self.areas
            .values()
            .find(|a| a.contains_subject(id))
            .map(HoldingArea::name)
    }

    /// Name of the cell the identity occupies, if it occupies one.
    pub fn cell_of(&self, id: SubjectId) -> Option<&str> {
        self.areas.values().find_map(|a| a.cell_of(id))
    }

    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.areas.values().find_map(|a| a.subject(id))
    }

    pub fn subject_mut(&mut self, id: SubjectId) -> Option<&mut Subject> {
        self.areas.values_mut().find_map(|a| a.subject_mut(id))
    }

    /// Look up a confined subject by its last known display name,
    /// case-insensitively.
    pub fn subject_by_name(&self, name: &str) -> Option<&Subject> {
        self.areas
            .values()
            .flat_map(HoldingArea::subjects)
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Every confined subject across all areas.
    pub fn all_confined(&self) -> impl Iterator<Item = &Subject> {
        self.areas.values().flat_map(HoldingArea::subjects)
    }

    /// Total confined population across all areas.
    #[must_use]
    pub fn total_confined(&self) -> usize {
        self.areas.values().map(HoldingArea::total_confined).sum()
    }

    /// The first empty cell of an area, required: errors with `NoFreeCell`
    /// when every cell is occupied (or the area has none). This is the
    /// strict resolution used by operator-facing callers; the entry
    /// protocol's `Any` selector instead degrades to general population.
    pub fn require_empty_cell<'a>(
        &'a self,
        area_name: &str,
    ) -> Result<&'a crate::domain::area::HoldingCell, CustodyError> {
        let area = self.area(area_name).ok_or(CustodyError::AreaRequired {
            action: "resolving an empty cell",
        })?;
        area.first_empty_cell().ok_or_else(|| CustodyError::NoFreeCell {
            area: area.name().to_owned(),
        })
    }

    /// Force-detach every subject held by one area, returning the detached
    /// records. Persistence and environmental effects are the caller's
    /// responsibility.
    pub fn clear_area(&mut self, name: &str) -> Result<Vec<Subject>, CustodyError> {
        let area = self.area_mut(name).ok_or(CustodyError::AreaRequired {
            action: "clearing a holding area",
        })?;

        let ids: Vec<SubjectId> = area.subjects().map(Subject::id).collect();
        let mut detached = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((subject, _)) = area.detach_subject(id) {
                detached.push(subject);
            }
        }
        Ok(detached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::area::{HoldingCell, Region};
    use uuid::Uuid;

    fn point(x: f64) -> Point {
        Point::new(x, 0.0, 0.0)
    }

    fn make_area(name: &str, origin: f64) -> HoldingArea {
        let mut area = HoldingArea::new(
            name,
            Region::new(point(origin), Point::new(origin + 10.0, 10.0, 10.0)),
            point(origin + 1.0),
            point(origin + 2.0),
            point(origin + 20.0),
        );
        area.add_cell(HoldingCell::new("c1", point(origin + 3.0)));
        area
    }

    fn subject() -> Subject {
        Subject::new(Uuid::new_v4(), "vex", 60_000)
    }

    fn registry() -> AreaRegistry {
        let mut r = AreaRegistry::new();
        r.add_area(make_area("East", 0.0));
        r.add_area(make_area("West", 100.0));
        r
    }

    #[test]
    fn test_area_lookup_is_case_insensitive() {
        let r = registry();
        assert!(r.area("east").is_some());
        assert!(r.area("EAST").is_some());
        assert!(r.is_valid_area("West"));
        assert!(!r.is_valid_area("north"));
    }

    #[test]
    fn test_areas_by_prefix_sorted() {
        let r = registry();
        assert_eq!(r.areas_by_prefix(""), vec!["East", "West"]);
        assert_eq!(r.areas_by_prefix("we"), vec!["West"]);
        assert!(r.areas_by_prefix("x").is_empty());
    }

    #[test]
    fn test_area_from_point() {
        let r = registry();
        assert_eq!(r.area_from_point(point(5.0)).unwrap().name(), "East");
        assert_eq!(r.area_from_point(point(105.0)).unwrap().name(), "West");
        assert!(r.area_from_point(point(50.0)).is_none());
    }

    #[test]
    fn test_confinement_lookups() {
        let mut r = registry();
        let s = subject();
        let id = s.id();
        r.area_mut("east").unwrap().add_to_population(s);

        assert!(r.is_confined(id));
        assert_eq!(r.area_of(id), Some("East"));
        assert_eq!(r.cell_of(id), None);
        assert!(r.subject(id).is_some());
        assert!(r.subject_by_name("VEX").is_some());
        assert_eq!(r.total_confined(), 1);
    }

    #[test]
    fn test_remove_area_refused_while_occupied() {
        let mut r = registry();
        let s = subject();
        let id = s.id();
        r.area_mut("east").unwrap().add_to_population(s);

        let err = r.remove_area("east").unwrap_err();
        assert!(matches!(err, CustodyError::AreaNotEmpty { count: 1, .. }));

        r.area_mut("east").unwrap().detach_subject(id);
        assert!(r.remove_area("east").is_ok());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_require_empty_cell() {
        let mut r = registry();
        assert_eq!(r.require_empty_cell("east").unwrap().name(), "c1");

        r.area_mut("east")
            .unwrap()
            .cell_mut("c1")
            .unwrap()
            .set_occupant(subject());
        let err = r.require_empty_cell("east").unwrap_err();
        assert!(matches!(err, CustodyError::NoFreeCell { .. }));
    }

    #[test]
    fn test_clear_area_detaches_everyone() {
        let mut r = registry();
        r.area_mut("east").unwrap().add_to_population(subject());
        r.area_mut("east")
            .unwrap()
            .cell_mut("c1")
            .unwrap()
            .set_occupant(subject());

        let detached = r.clear_area("east").unwrap();
        assert_eq!(detached.len(), 2);
        assert_eq!(r.total_confined(), 0);
    }
}
