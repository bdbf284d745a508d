//! Built-in type rules for the Apex and Visualforce reference deliverables.

use atlasdash_shared::TypeDescriptor;

fn suffix(type_name: &str, title_suffix: &str) -> TypeDescriptor {
    TypeDescriptor {
        type_name: type_name.into(),
        title_suffix: Some(title_suffix.into()),
        ..TypeDescriptor::default()
    }
}

/// Rules in priority order.
pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        // Visualforce component reference pages are recognised by id.
        TypeDescriptor {
            type_name: "Tag".into(),
            id_prefix: Some("pages_compref_".into()),
            no_trim: true,
            ..TypeDescriptor::default()
        },
        TypeDescriptor {
            is_container: true,
            show_namespace: true,
            ..suffix("Method", "Methods")
        },
        TypeDescriptor {
            is_container: true,
            ..suffix("Constructor", "Constructors")
        },
        TypeDescriptor {
            push_name: true,
            ..suffix("Class", "Class")
        },
        TypeDescriptor {
            push_name: true,
            ..suffix("Namespace", "Namespace")
        },
        TypeDescriptor {
            push_name: true,
            ..suffix("Interface", "Interface")
        },
        suffix("Statement", "Statement"),
        suffix("Enum", "Enum"),
        TypeDescriptor {
            is_container: true,
            ..suffix("Property", "Properties")
        },
        TypeDescriptor {
            no_trim: true,
            ..suffix("Guide", "Example Implementation")
        },
        TypeDescriptor {
            no_trim: true,
            is_container: true,
            ..suffix("Statement", "Statements")
        },
        TypeDescriptor {
            push_name: true,
            is_container: true,
            ..suffix("Field", "Fields")
        },
        TypeDescriptor {
            no_trim: true,
            ..suffix("Exception", "Exceptions")
        },
        TypeDescriptor {
            no_trim: true,
            ..suffix("Constant", "Constants")
        },
        TypeDescriptor {
            push_name: true,
            ..suffix("Class", "Class (Base Email Methods)")
        },
    ]
}
