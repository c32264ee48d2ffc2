use crate::{
    error::DefinitionError,
    model::{
        association::{AssociationKind, AssociationPath, JoinStep, ResolvedPath},
        entity::{EntityModel, FieldKind},
    },
};
use std::collections::BTreeMap;

///
/// Schema
///
/// Validated set of entities. Every association target and foreign key is
/// checked on construction, so path resolution only has to walk names.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Schema {
    entities: BTreeMap<String, EntityModel>,
}

impl Schema {
    pub fn new(entities: impl IntoIterator<Item = EntityModel>) -> Result<Self, DefinitionError> {
        let mut map = BTreeMap::new();
        for entity in entities {
            if !entity.has_field(&entity.primary_key) {
                return Err(DefinitionError::unknown_field(
                    &entity.name,
                    &entity.primary_key,
                ));
            }
            if map.contains_key(&entity.name) {
                return Err(DefinitionError::duplicate("entity", &entity.name));
            }
            map.insert(entity.name.clone(), entity);
        }

        let schema = Self { entities: map };
        for entity in schema.entities.values() {
            schema.validate_associations(entity)?;
        }

        Ok(schema)
    }

    // Check association targets and foreign-key placement for one entity.
    fn validate_associations(&self, entity: &EntityModel) -> Result<(), DefinitionError> {
        for (i, assoc) in entity.associations.iter().enumerate() {
            if entity.associations[..i]
                .iter()
                .any(|prev| prev.name == assoc.name)
            {
                return Err(DefinitionError::duplicate(
                    "association",
                    format!("{}.{}", entity.name, assoc.name),
                ));
            }

            let target = self.entity(&assoc.target)?;
            let key_owner = match assoc.kind {
                AssociationKind::BelongsTo => entity,
                AssociationKind::HasMany | AssociationKind::HasOne => target,
            };
            if !key_owner.has_field(&assoc.foreign_key) {
                return Err(DefinitionError::unknown_field(
                    &key_owner.name,
                    &assoc.foreign_key,
                ));
            }
        }

        Ok(())
    }

    pub fn entity(&self, name: &str) -> Result<&EntityModel, DefinitionError> {
        self.entities
            .get(name)
            .ok_or_else(|| DefinitionError::unknown_entity(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Walk `path` from `entity`, producing one join step per hop.
    pub fn resolve(
        &self,
        entity: &str,
        path: &AssociationPath,
    ) -> Result<ResolvedPath, DefinitionError> {
        let mut current = self.entity(entity)?;
        let mut steps = Vec::with_capacity(path.len());

        for (i, name) in path.segments().iter().enumerate() {
            let assoc = current.find_association(name).ok_or_else(|| {
                DefinitionError::UnknownAssociation {
                    entity: current.name.clone(),
                    association: name.clone(),
                }
            })?;
            let target = self.entity(&assoc.target)?;

            let (source_column, target_column) = match assoc.kind {
                AssociationKind::BelongsTo => {
                    (assoc.foreign_key.clone(), target.primary_key.clone())
                }
                AssociationKind::HasMany | AssociationKind::HasOne => {
                    (current.primary_key.clone(), assoc.foreign_key.clone())
                }
            };

            steps.push(JoinStep {
                path: path.prefix(i + 1),
                kind: assoc.kind,
                source_entity: current.name.clone(),
                target_entity: target.name.clone(),
                source_column,
                target_column,
            });
            current = target;
        }

        Ok(ResolvedPath {
            path: path.clone(),
            steps,
            target: current.name.clone(),
        })
    }

    /// Resolve `path` and check that `field` exists on the entity it reaches.
    pub fn resolve_field(
        &self,
        entity: &str,
        path: &AssociationPath,
        field: &str,
    ) -> Result<ResolvedPath, DefinitionError> {
        let resolved = self.resolve(entity, path)?;
        let target = self.entity(&resolved.target)?;
        if !target.has_field(field) {
            return Err(DefinitionError::unknown_field(&target.name, field));
        }

        Ok(resolved)
    }

    /// Kind of `field` on the entity reached from `entity` by `path`.
    pub fn field_kind(
        &self,
        entity: &str,
        path: &AssociationPath,
        field: &str,
    ) -> Result<FieldKind, DefinitionError> {
        let resolved = self.resolve(entity, path)?;
        let target = self.entity(&resolved.target)?;

        target
            .find_field(field)
            .map(|model| model.kind)
            .ok_or_else(|| DefinitionError::unknown_field(&target.name, field))
    }
}
