//! Whitelists for the listed entities.
//!
//! Public names are the camelCase names clients see; columns are the store's
//! snake_case names. Only names present here can reach a query.

use crate::defaults::SOFT_DELETE_PARAM;
use crate::pagination::SortDirection;
use crate::query::{
    EntitySortSchema, FieldRef, FilterField, OrderBy, SoftDelete, SortableField, TextSearchSpec,
};

/// Name of the creator relation on projects.
pub const CREATOR: &str = "creator";

const IS_DELETED: SoftDelete = SoftDelete {
    param: SOFT_DELETE_PARAM,
    field: FieldRef::own("is_deleted"),
};

const CREATED_AT_DESC: OrderBy = OrderBy {
    name: "createdAt",
    field: FieldRef::own("created_at"),
    direction: SortDirection::Desc,
};

// =============================================================================
// PROJECT
// =============================================================================

const PROJECT_SORTABLE: &[SortableField] = &[
    SortableField {
        name: "name",
        field: FieldRef::own("name"),
    },
    SortableField {
        name: "category",
        field: FieldRef::own("category"),
    },
    SortableField {
        name: "region",
        field: FieldRef::own("region"),
    },
    SortableField {
        name: "happenedAt",
        field: FieldRef::own("happened_at"),
    },
    SortableField {
        name: "createdAt",
        field: FieldRef::own("created_at"),
    },
    SortableField {
        name: "updatedAt",
        field: FieldRef::own("updated_at"),
    },
];

const PROJECT_SEARCH_FIELDS: &[FieldRef] = &[
    FieldRef::own("name"),
    FieldRef::related(CREATOR, "username"),
    FieldRef::related(CREATOR, "first_name"),
    FieldRef::related(CREATOR, "last_name"),
];

const PROJECT_FILTERS: &[FilterField] = &[
    FilterField {
        param: "category",
        field: FieldRef::own("category"),
    },
    FilterField {
        param: "region",
        field: FieldRef::own("region"),
    },
];

/// Projects, listed newest first with their creator.
pub const PROJECT_SCHEMA: EntitySortSchema = EntitySortSchema {
    entity: "project",
    id_field: FieldRef::own("id"),
    sortable: PROJECT_SORTABLE,
    default_order: &[CREATED_AT_DESC],
    soft_delete: Some(IS_DELETED),
    search: Some(TextSearchSpec {
        param: "name",
        fields: PROJECT_SEARCH_FIELDS,
    }),
    exact_filters: PROJECT_FILTERS,
    relations: &[CREATOR],
    location_field: Some(FieldRef::own("location")),
};

// =============================================================================
// USER
// =============================================================================

const USER_SORTABLE: &[SortableField] = &[
    SortableField {
        name: "username",
        field: FieldRef::own("username"),
    },
    SortableField {
        name: "firstName",
        field: FieldRef::own("first_name"),
    },
    SortableField {
        name: "lastName",
        field: FieldRef::own("last_name"),
    },
    SortableField {
        name: "status",
        field: FieldRef::own("status"),
    },
    SortableField {
        name: "createdAt",
        field: FieldRef::own("created_at"),
    },
    SortableField {
        name: "updatedAt",
        field: FieldRef::own("updated_at"),
    },
];

const USER_SEARCH_FIELDS: &[FieldRef] = &[
    FieldRef::own("username"),
    FieldRef::own("first_name"),
    FieldRef::own("last_name"),
];

const USER_FILTERS: &[FilterField] = &[FilterField {
    param: "status",
    field: FieldRef::own("status"),
}];

/// Admin users.
pub const USER_SCHEMA: EntitySortSchema = EntitySortSchema {
    entity: "user",
    id_field: FieldRef::own("id"),
    sortable: USER_SORTABLE,
    default_order: &[CREATED_AT_DESC],
    soft_delete: Some(IS_DELETED),
    search: Some(TextSearchSpec {
        param: "username",
        fields: USER_SEARCH_FIELDS,
    }),
    exact_filters: USER_FILTERS,
    relations: &[],
    location_field: None,
};
