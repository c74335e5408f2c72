//! Static marketing page handlers.

use askama::Template;
use askama_web::WebTemplate;

use crate::filters;
use crate::middleware::CurrentSession;
use crate::models::ViewerView;

/// A client sector on the clients page.
pub struct ClientSector {
    pub name: &'static str,
    pub summary: &'static str,
}

const CLIENT_SECTORS: &[ClientSector] = &[
    ClientSector {
        name: "Banking & Finance",
        summary: "Fire-rated safes, cash handling and vault-grade storage for branches.",
    },
    ClientSector {
        name: "Government",
        summary: "Document security cabinets and secure records storage for ministries.",
    },
    ClientSector {
        name: "Education",
        summary: "Student and staff lockers, exam paper safes and campus printers.",
    },
    ClientSector {
        name: "Healthcare",
        summary: "Medicine cabinets and patient record storage for clinics and hospitals.",
    },
    ClientSector {
        name: "Corporate Offices",
        summary: "Office printers, key cabinets and staff lockers for workplaces of any size.",
    },
];

/// About page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub viewer: Option<ViewerView>,
}

/// Clients page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/clients.html")]
pub struct ClientsTemplate {
    pub viewer: Option<ViewerView>,
    pub sectors: &'static [ClientSector],
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub viewer: Option<ViewerView>,
}

pub async fn about(session: CurrentSession) -> AboutTemplate {
    AboutTemplate {
        viewer: session.viewer(),
    }
}

pub async fn clients(session: CurrentSession) -> ClientsTemplate {
    ClientsTemplate {
        viewer: session.viewer(),
        sectors: CLIENT_SECTORS,
    }
}

pub async fn contact(session: CurrentSession) -> ContactTemplate {
    ContactTemplate {
        viewer: session.viewer(),
    }
}
