//! Test artifact rendering.
//!
//! A template is a fixed sequence of literal text and named slots. Rendering is
//! a pure function of the model, so every slot is always resolved.

use indexmap::IndexSet;

use crate::data::{Method, ServiceModel};

use Segment::{Slot as S, Text as T};

/// Which test harness the artifact targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStyle {
    /// Boots the application context (`@SpringBootTest`).
    FrameworkIntegrated,
    /// Plain MockK extension without an application context.
    IsolatedMock,
}

impl TemplateStyle {
    pub fn for_framework(has_framework_entrypoint: bool) -> Self {
        if has_framework_entrypoint {
            TemplateStyle::FrameworkIntegrated
        } else {
            TemplateStyle::IsolatedMock
        }
    }

    fn template(self) -> &'static [Segment] {
        match self {
            TemplateStyle::FrameworkIntegrated => FRAMEWORK_TEMPLATE,
            TemplateStyle::IsolatedMock => ISOLATED_TEMPLATE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TestIntent {
    #[default]
    Unit,
    Integration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    PackageDeclaration,
    Imports,
    IntentImport,
    IntentAnnotation,
    ServiceName,
    InstanceName,
    DependencyMocks,
    ConstructorParams,
    TestMethods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Must appear in every template.
    Required,
    /// May be absent from a template, and may render empty.
    Optional,
}

impl Slot {
    pub const ALL: [Slot; 9] = [
        Slot::PackageDeclaration,
        Slot::Imports,
        Slot::IntentImport,
        Slot::IntentAnnotation,
        Slot::ServiceName,
        Slot::InstanceName,
        Slot::DependencyMocks,
        Slot::ConstructorParams,
        Slot::TestMethods,
    ];

    pub fn cardinality(self) -> Cardinality {
        match self {
            Slot::ServiceName
            | Slot::InstanceName
            | Slot::DependencyMocks
            | Slot::ConstructorParams
            | Slot::TestMethods => Cardinality::Required,
            Slot::PackageDeclaration
            | Slot::Imports
            | Slot::IntentImport
            | Slot::IntentAnnotation => Cardinality::Optional,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Text(&'static str),
    Slot(Slot),
}

const FRAMEWORK_TEMPLATE: &[Segment] = &[
    S(Slot::PackageDeclaration),
    S(Slot::Imports),
    T("import io.mockk.MockKAnnotations\n\
       import io.mockk.impl.annotations.MockK\n\
       import io.mockk.junit5.MockKExtension\n\
       import org.junit.jupiter.api.Assertions.assertNotNull\n\
       import org.junit.jupiter.api.BeforeEach\n\
       import org.junit.jupiter.api.DisplayName\n"),
    S(Slot::IntentImport),
    T("import org.junit.jupiter.api.Test\n\
       import org.junit.jupiter.api.assertThrows\n\
       import org.junit.jupiter.api.extension.ExtendWith\n\
       import org.springframework.boot.test.context.SpringBootTest\n\
       \n"),
    S(Slot::IntentAnnotation),
    T("@SpringBootTest\n\
       @ExtendWith(MockKExtension::class)\n\
       class "),
    S(Slot::ServiceName),
    T("Test {\n\n"),
    S(Slot::DependencyMocks),
    T("    private lateinit var "),
    S(Slot::InstanceName),
    T(": "),
    S(Slot::ServiceName),
    T("\n\n    @BeforeEach\n    fun setUp() {\n        MockKAnnotations.init(this)\n        "),
    S(Slot::InstanceName),
    T(" = "),
    S(Slot::ServiceName),
    T("(\n"),
    S(Slot::ConstructorParams),
    T("        )\n    }\n"),
    S(Slot::TestMethods),
    T("}\n"),
];

const ISOLATED_TEMPLATE: &[Segment] = &[
    S(Slot::PackageDeclaration),
    S(Slot::Imports),
    T("import io.mockk.MockKAnnotations\n\
       import io.mockk.impl.annotations.MockK\n\
       import io.mockk.junit5.MockKExtension\n\
       import org.junit.jupiter.api.Assertions.assertNotNull\n\
       import org.junit.jupiter.api.BeforeEach\n\
       import org.junit.jupiter.api.DisplayName\n"),
    S(Slot::IntentImport),
    T("import org.junit.jupiter.api.Test\n\
       import org.junit.jupiter.api.assertThrows\n\
       import org.junit.jupiter.api.extension.ExtendWith\n\
       \n\
       /**\n\
       \x20* Tests for ["),
    S(Slot::ServiceName),
    T("] with mocked collaborators.\n */\n"),
    S(Slot::IntentAnnotation),
    T("@ExtendWith(MockKExtension::class)\nclass "),
    S(Slot::ServiceName),
    T("Test {\n\n"),
    S(Slot::DependencyMocks),
    T("    private lateinit var "),
    S(Slot::InstanceName),
    T(": "),
    S(Slot::ServiceName),
    T("\n\n    @BeforeEach\n    fun setUp() {\n        MockKAnnotations.init(this)\n        "),
    S(Slot::InstanceName),
    T(" = "),
    S(Slot::ServiceName),
    T("(\n"),
    S(Slot::ConstructorParams),
    T("        )\n    }\n"),
    S(Slot::TestMethods),
    T("}\n"),
];

/// Renders the test artifact for `model`.
pub fn render(model: &ServiceModel, style: TemplateStyle, intent: TestIntent) -> String {
    let instance = model.instance_name();
    let mut out = String::new();
    for segment in style.template() {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Slot(slot) => out.push_str(&slot_value(*slot, model, &instance, intent)),
        }
    }
    out
}

fn slot_value(slot: Slot, model: &ServiceModel, instance: &str, intent: TestIntent) -> String {
    match slot {
        Slot::PackageDeclaration if model.package_name.is_empty() => String::new(),
        Slot::PackageDeclaration => format!("package {}\n\n", model.package_name),
        Slot::Imports => import_block(model),
        Slot::IntentImport => match intent {
            TestIntent::Unit => String::new(),
            TestIntent::Integration => "import org.junit.jupiter.api.Tag\n".to_string(),
        },
        Slot::IntentAnnotation => match intent {
            TestIntent::Unit => String::new(),
            TestIntent::Integration => "@Tag(\"integration\")\n".to_string(),
        },
        Slot::ServiceName => model.class_name.clone(),
        Slot::InstanceName => instance.to_string(),
        Slot::DependencyMocks => model
            .dependencies
            .iter()
            .map(|d| format!("    @MockK\n    private lateinit var {}: {}\n\n", d.name, d.type_name))
            .collect(),
        Slot::ConstructorParams => {
            if model.dependencies.is_empty() {
                return String::new();
            }
            let args: Vec<String> = model
                .dependencies
                .iter()
                .map(|d| format!("            {} = {}", d.name, d.name))
                .collect();
            format!("{}\n", args.join(",\n"))
        }
        Slot::TestMethods => model
            .testable_methods()
            .map(|m| test_cases(m, instance))
            .collect(),
    }
}

/// One `import` line per distinct resolved dependency path, first seen first.
fn import_block(model: &ServiceModel) -> String {
    let unique: IndexSet<&str> = model.dependency_import_paths().collect();
    unique
        .into_iter()
        .map(|path| format!("import {}\n", path))
        .collect()
}

/// Success case immediately followed by its error case.
fn test_cases(method: &Method, instance: &str) -> String {
    let name = &method.name;
    format!(
        r#"
    @Test
    @DisplayName("{name} - success")
    fun `{name}_success`() {{
        // Given: stub collaborator responses here

        // When
        val result = {instance}.{name}()

        // Then
        assertNotNull(result)
    }}

    @Test
    @DisplayName("{name} - error")
    fun `{name}_error`() {{
        // Given: stub a failing collaborator here

        // When & Then
        assertThrows<Exception> {{
            {instance}.{name}()
        }}
    }}
"#
    )
}
