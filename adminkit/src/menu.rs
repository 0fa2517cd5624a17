use crate::view::ModelView;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum MenuItem {
    Category {
        name: String,
        icon: Option<String>,
        #[schema(no_recursion)]
        children: Vec<MenuItem>,
    },
    View {
        name: String,
        identity: String,
        icon: Option<String>,
        url: String,
    },
}

impl MenuItem {
    pub fn name(&self) -> &str {
        match self {
            MenuItem::Category { name, .. } | MenuItem::View { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Menu {
    pub items: Vec<MenuItem>,
}

impl Menu {
    /// Appends the view's entry; views naming the same category end up under one category item.
    pub fn add_view(&mut self, view: &ModelView, base_url: &str) {
        let item = MenuItem::View {
            name: view.name_plural.clone(),
            identity: view.identity.clone(),
            icon: view.icon.clone(),
            url: format!("{}/{}/list", base_url.trim_end_matches('/'), view.identity),
        };
        let Some(category) = &view.category else {
            self.items.push(item);
            return;
        };
        for existing in self.items.iter_mut() {
            if let MenuItem::Category { name, children, .. } = existing {
                if name == category {
                    children.push(item);
                    return;
                }
            }
        }
        self.items.push(MenuItem::Category { name: category.clone(), icon: None, children: vec![item] });
    }
}
