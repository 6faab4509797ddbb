use serde::{Deserialize, Serialize};

use super::domain::{CourseId, PackageId, RawPreferenceData, StudentId};

/// Layout a ranked list was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceShapeKind {
    PerPackage,
    ChosenPackage,
    LegacyList,
}

/// One candidate layout found in a raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceShape<'a> {
    PerPackage(&'a [CourseId]),
    ChosenPackage {
        package_id: &'a PackageId,
        courses: &'a [CourseId],
    },
    LegacyList(&'a [CourseId]),
}

impl<'a> PreferenceShape<'a> {
    pub fn kind(&self) -> PreferenceShapeKind {
        match self {
            PreferenceShape::PerPackage(_) => PreferenceShapeKind::PerPackage,
            PreferenceShape::ChosenPackage { .. } => PreferenceShapeKind::ChosenPackage,
            PreferenceShape::LegacyList(_) => PreferenceShapeKind::LegacyList,
        }
    }

    fn courses_for(&self, package_id: &PackageId) -> &'a [CourseId] {
        match *self {
            PreferenceShape::PerPackage(courses) | PreferenceShape::LegacyList(courses) => courses,
            PreferenceShape::ChosenPackage {
                package_id: chosen,
                courses,
            } => {
                if chosen == package_id {
                    courses
                } else {
                    &[]
                }
            }
        }
    }
}

/// Canonical ranked list for one student and package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPreferences {
    pub student_id: StudentId,
    pub package_id: PackageId,
    pub courses: Vec<CourseId>,
    pub shape: PreferenceShapeKind,
}

/// Normalizes the legacy preference layouts into a single ranked list.
///
/// Shapes are tried in a fixed order (per-package map, chosen-package pair, legacy flat list)
/// and the first non-empty list wins. The legacy list only counts for the package that owns it
/// (see [`RawPreferenceData::legacy_owner`]); an unowned list is left to the caller's cohort
/// filter. Course membership is not checked here.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceResolver;

impl PreferenceResolver {
    pub fn shapes<'a>(
        raw: &'a RawPreferenceData,
        package_id: &PackageId,
    ) -> Vec<PreferenceShape<'a>> {
        let mut shapes = Vec::with_capacity(3);
        if let Some(courses) = raw.by_package.get(package_id) {
            shapes.push(PreferenceShape::PerPackage(courses));
        }
        if let Some(chosen) = raw.chosen_package.as_ref() {
            shapes.push(PreferenceShape::ChosenPackage {
                package_id: chosen,
                courses: &raw.chosen_courses,
            });
        }
        if raw.legacy_owner().map_or(true, |owner| owner == package_id) {
            shapes.push(PreferenceShape::LegacyList(&raw.legacy_list));
        }
        shapes
    }

    pub fn resolve(
        &self,
        student_id: &StudentId,
        raw: &RawPreferenceData,
        package_id: &PackageId,
    ) -> Option<ResolvedPreferences> {
        Self::shapes(raw, package_id).into_iter().find_map(|shape| {
            let courses = shape.courses_for(package_id);
            if courses.is_empty() {
                None
            } else {
                Some(ResolvedPreferences {
                    student_id: student_id.clone(),
                    package_id: package_id.clone(),
                    courses: courses.to_vec(),
                    shape: shape.kind(),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<CourseId> {
        values.iter().map(|value| CourseId::from(*value)).collect()
    }

    fn package() -> PackageId {
        PackageId::from("pkg-2")
    }

    #[test]
    fn per_package_list_wins_over_other_shapes() {
        let mut raw = RawPreferenceData::default();
        raw.by_package.insert(package(), ids(&["a", "b"]));
        raw.chosen_package = Some(package());
        raw.chosen_courses = ids(&["c"]);
        raw.legacy_list = ids(&["d"]);

        let resolved = PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .expect("resolves");
        assert_eq!(resolved.courses, ids(&["a", "b"]));
        assert_eq!(resolved.shape, PreferenceShapeKind::PerPackage);
    }

    #[test]
    fn empty_per_package_list_falls_through_to_chosen_pair() {
        let mut raw = RawPreferenceData::default();
        raw.by_package.insert(package(), Vec::new());
        raw.chosen_package = Some(package());
        raw.chosen_courses = ids(&["c", "a"]);

        let resolved = PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .expect("resolves");
        assert_eq!(resolved.courses, ids(&["c", "a"]));
        assert_eq!(resolved.shape, PreferenceShapeKind::ChosenPackage);
    }

    #[test]
    fn chosen_pair_for_another_package_claims_the_legacy_list_too() {
        let mut raw = RawPreferenceData::default();
        raw.chosen_package = Some(PackageId::from("pkg-9"));
        raw.chosen_courses = ids(&["c"]);
        raw.legacy_list = ids(&["legacy"]);

        assert!(PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .is_none());

        let resolved = PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &PackageId::from("pkg-9"))
            .expect("resolves for the chosen package");
        assert_eq!(resolved.courses, ids(&["c"]));
    }

    #[test]
    fn legacy_list_only_serves_its_recorded_package() {
        let mut raw = RawPreferenceData::default();
        raw.legacy_list = ids(&["x"]);
        raw.legacy_package = Some(PackageId::from("pkg-9"));

        assert!(PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .is_none());

        raw.legacy_package = Some(package());
        let resolved = PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .expect("resolves for the owning package");
        assert_eq!(resolved.shape, PreferenceShapeKind::LegacyList);
    }

    #[test]
    fn keeps_unknown_ids_for_the_engine_to_skip() {
        let mut raw = RawPreferenceData::default();
        raw.legacy_list = ids(&["not-in-package"]);

        let resolved = PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .expect("resolves");
        assert_eq!(resolved.courses, ids(&["not-in-package"]));
    }

    #[test]
    fn absent_when_no_shape_has_data() {
        let raw = RawPreferenceData::default();
        assert!(PreferenceResolver
            .resolve(&StudentId::from("s-1"), &raw, &package())
            .is_none());
    }
}
