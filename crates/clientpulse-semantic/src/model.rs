//! Business entities, attributes, mappings and relations

use clientpulse_catalog::{CatalogService, CatalogStore, MappedAttribute, TableInfo};
use serde::{Deserialize, Serialize};

/// Validation failures raised when wiring the semantic layer to the catalog
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Mapping references unknown table '{table}'")]
    UnknownTable { table: String },

    #[error("Mapping references unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Mapping references undeclared entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error("Relation references undeclared entity '{entity}'")]
    UnknownRelationEntity { entity: String },
}

/// A business attribute of an entity (e.g. "MRR" on "Customer")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,

    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    /// Create a named attribute
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A business entity, independent of any single table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Entity name (e.g. "Customer")
    pub name: String,

    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared attributes
    pub attributes: Vec<Attribute>,
}

impl EntityDefinition {
    /// Create an entity with no attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            attributes: Vec::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name));
        self
    }
}

/// Binds one attribute to one (table, column) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Entity the attribute belongs to
    pub entity: String,

    /// Attribute being bound
    pub attribute: String,

    /// Target table fqn (`source.dataset.table`)
    pub table_fqn: String,

    /// Target column name
    pub column: String,
}

/// Declared business link between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    HasMany,
    HasOne,
    BelongsTo,
    ManyToMany,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HasMany => write!(f, "HAS_MANY"),
            Self::HasOne => write!(f, "HAS_ONE"),
            Self::BelongsTo => write!(f, "BELONGS_TO"),
            Self::ManyToMany => write!(f, "MANY_TO_MANY"),
        }
    }
}

/// A declared relation between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Entity on the owning side
    pub from_entity: String,

    /// Entity on the related side
    pub to_entity: String,

    /// Relation kind
    pub kind: RelationKind,
}

/// The semantic model: entities, validated mappings, declared relations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticModel {
    /// Declared entities
    pub entities: Vec<EntityDefinition>,

    /// Validated attribute mappings
    pub mappings: Vec<Mapping>,

    /// Declared relations (no physical validation)
    pub relations: Vec<Relation>,
}

impl SemanticModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity
    pub fn add_entity(&mut self, entity: EntityDefinition) {
        self.entities.push(entity);
    }

    /// Look up a declared entity by name
    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Add a mapping, validating it against the catalog
    ///
    /// Rejected with `ValidationError` if the entity is undeclared or the
    /// target table/column does not resolve in the catalog.
    pub fn add_mapping(
        &mut self,
        mapping: Mapping,
        catalog: &CatalogStore,
    ) -> Result<(), ValidationError> {
        if self.entity(&mapping.entity).is_none() {
            return Err(ValidationError::UnknownEntity {
                entity: mapping.entity,
            });
        }
        if catalog.get_table(&mapping.table_fqn).is_none() {
            return Err(ValidationError::UnknownTable {
                table: mapping.table_fqn,
            });
        }
        if !catalog.has_column(&mapping.table_fqn, &mapping.column) {
            return Err(ValidationError::UnknownColumn {
                table: mapping.table_fqn,
                column: mapping.column,
            });
        }
        self.mappings.push(mapping);
        Ok(())
    }

    /// Declare a relation between two declared entities
    pub fn add_relation(&mut self, relation: Relation) -> Result<(), ValidationError> {
        for entity in [&relation.from_entity, &relation.to_entity] {
            if self.entity(entity).is_none() {
                return Err(ValidationError::UnknownRelationEntity {
                    entity: entity.clone(),
                });
            }
        }
        self.relations.push(relation);
        Ok(())
    }

    /// Mappings that reference a given table, as catalog-side bindings
    pub fn mapped_attributes_for(&self, table_fqn: &str) -> Vec<MappedAttribute> {
        self.mappings
            .iter()
            .filter(|m| m.table_fqn == table_fqn)
            .map(|m| MappedAttribute {
                entity: m.entity.clone(),
                attribute: m.attribute.clone(),
                column: m.column.clone(),
            })
            .collect()
    }

    /// Technical metadata for a table merged with this model's mappings
    pub fn table_info(&self, service: &CatalogService, table_fqn: &str) -> Option<TableInfo> {
        service.get_table_info(table_fqn, self.mapped_attributes_for(table_fqn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientpulse_core::{
        ColumnMeta, ColumnRecord, DatasetRecord, LogicalType, TableMeta, TableRecord,
    };
    use pretty_assertions::assert_eq;

    fn catalog_with_invoices() -> CatalogStore {
        let mut store = CatalogStore::new();
        store.upsert_dataset(DatasetRecord::new("crm", "billing"));
        store.upsert_table(TableRecord::new("crm.billing", TableMeta::new("invoices")));
        store.upsert_columns(
            "crm.billing.invoices",
            vec![ColumnRecord::new(
                "crm.billing.invoices",
                ColumnMeta::new("amount", LogicalType::Float, 1),
            )],
        );
        store
    }

    fn model_with_customer() -> SemanticModel {
        let mut model = SemanticModel::new();
        model.add_entity(EntityDefinition::new("Customer").with_attribute("MRR"));
        model
    }

    #[test]
    fn valid_mapping_is_accepted() {
        let store = catalog_with_invoices();
        let mut model = model_with_customer();

        let result = model.add_mapping(
            Mapping {
                entity: "Customer".into(),
                attribute: "MRR".into(),
                table_fqn: "crm.billing.invoices".into(),
                column: "amount".into(),
            },
            &store,
        );

        assert!(result.is_ok());
        assert_eq!(model.mappings.len(), 1);
    }

    #[test]
    fn mapping_to_missing_column_is_rejected() {
        let store = catalog_with_invoices();
        let mut model = model_with_customer();

        let result = model.add_mapping(
            Mapping {
                entity: "Customer".into(),
                attribute: "MRR".into(),
                table_fqn: "crm.billing.invoices".into(),
                column: "mrr_amount".into(),
            },
            &store,
        );

        assert!(matches!(result, Err(ValidationError::UnknownColumn { .. })));
        assert!(model.mappings.is_empty());
    }

    #[test]
    fn mapping_to_missing_table_is_rejected() {
        let store = catalog_with_invoices();
        let mut model = model_with_customer();

        let result = model.add_mapping(
            Mapping {
                entity: "Customer".into(),
                attribute: "MRR".into(),
                table_fqn: "crm.billing.ghosts".into(),
                column: "amount".into(),
            },
            &store,
        );

        assert!(matches!(result, Err(ValidationError::UnknownTable { .. })));
    }

    #[test]
    fn relations_need_declared_entities() {
        let mut model = model_with_customer();

        let missing = model.add_relation(Relation {
            from_entity: "Customer".into(),
            to_entity: "Subscription".into(),
            kind: RelationKind::HasMany,
        });
        assert!(matches!(
            missing,
            Err(ValidationError::UnknownRelationEntity { .. })
        ));

        model.add_entity(EntityDefinition::new("Subscription"));
        let ok = model.add_relation(Relation {
            from_entity: "Customer".into(),
            to_entity: "Subscription".into(),
            kind: RelationKind::HasMany,
        });
        assert!(ok.is_ok());
    }

    #[test]
    fn mapped_attributes_filter_by_table() {
        let store = catalog_with_invoices();
        let mut model = model_with_customer();
        model
            .add_mapping(
                Mapping {
                    entity: "Customer".into(),
                    attribute: "MRR".into(),
                    table_fqn: "crm.billing.invoices".into(),
                    column: "amount".into(),
                },
                &store,
            )
            .unwrap();

        assert_eq!(model.mapped_attributes_for("crm.billing.invoices").len(), 1);
        assert!(model.mapped_attributes_for("crm.billing.other").is_empty());
    }
}
