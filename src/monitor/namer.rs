use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tera::Tera;

const TEMPLATE_NAME: &str = "monitor-name";

/// Renders monitor names from a template. The template sees `IngressName` and
/// `Namespace`.
#[derive(Debug)]
pub struct Namer {
    tera: Tera,
}

impl Namer {
    pub fn new(template: &str) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, template)?;
        Ok(Self { tera })
    }

    pub fn name(&self, ingress: &Ingress) -> Result<String, tera::Error> {
        self.render(&ingress.namespace().unwrap_or_default(), &ingress.name_any())
    }

    pub fn render(&self, namespace: &str, ingress_name: &str) -> Result<String, tera::Error> {
        let mut context = tera::Context::new();
        context.insert("IngressName", ingress_name);
        context.insert("Namespace", namespace);
        self.tera.render(TEMPLATE_NAME, &context)
    }
}
