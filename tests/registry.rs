//! Engine selection behaviour of the registry.

use async_trait::async_trait;
use edgequake_pdf2ocr::engine::StructuredRecognitionResult;
use edgequake_pdf2ocr::{
    CallContext, DocumentType, EngineInfo, EngineRegistry, MathpixConfig, MathpixEngine,
    MockEngine, Pdf2OcrError, RecognitionEngine, RecognitionResult,
};
use std::sync::Arc;

/// Remote-flavoured engine that never gets called.
struct Remote(&'static str);

#[async_trait]
impl RecognitionEngine for Remote {
    async fn extract_text(
        &self,
        _ctx: &CallContext,
        _image: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        unreachable!("selection tests never recognise")
    }

    async fn extract_structured_text(
        &self,
        _ctx: &CallContext,
        _image: &[u8],
        _hint: DocumentType,
    ) -> Result<StructuredRecognitionResult, Pdf2OcrError> {
        unreachable!("selection tests never recognise")
    }

    async fn process_pdf(
        &self,
        _ctx: &CallContext,
        _pdf: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        unreachable!("selection tests never recognise")
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            name: self.0.to_string(),
            version: "test".into(),
            supported_languages: vec!["en".into()],
            features: vec!["pdf".into()],
            is_local: false,
            requires_auth: true,
        }
    }
}

const ALL_TYPES: [DocumentType; 6] = [
    DocumentType::Typed,
    DocumentType::Handwritten,
    DocumentType::Math,
    DocumentType::Scanned,
    DocumentType::Mixed,
    DocumentType::Unknown,
];

fn mathpix() -> Arc<dyn RecognitionEngine> {
    let config = MathpixConfig::builder()
        .credentials("id", "key")
        .build()
        .unwrap();
    Arc::new(MathpixEngine::new(config).unwrap())
}

#[test]
fn only_stand_in_is_suggested_when_alone() {
    let registry = EngineRegistry::builder()
        .register("mock", Arc::new(MockEngine::new()))
        .build();
    assert_eq!(registry.suggest(DocumentType::Typed, 1024), "mock");
}

#[test]
fn remote_engine_always_wins() {
    let registry = EngineRegistry::builder()
        .register("mock", Arc::new(MockEngine::new()))
        .register("mathpix", mathpix())
        .build();
    // The stand-in stays default; suggestion still prefers the remote one.
    assert_eq!(registry.default_name(), Some("mock"));
    for doc_type in ALL_TYPES {
        for size in [0, 1, 1024, 50 * 1024 * 1024, u64::MAX] {
            assert_eq!(registry.suggest(doc_type, size), "mathpix");
        }
    }
}

#[test]
fn suggestion_ignores_registration_order() {
    let forward = EngineRegistry::builder()
        .register("mock", Arc::new(MockEngine::new()))
        .register("zeta", Arc::new(Remote("zeta")))
        .register("mathpix", mathpix())
        .build();
    let reverse = EngineRegistry::builder()
        .register("mathpix", mathpix())
        .register("zeta", Arc::new(Remote("zeta")))
        .register("mock", Arc::new(MockEngine::new()))
        .build();
    for doc_type in ALL_TYPES {
        assert_eq!(
            forward.suggest(doc_type, 4096),
            reverse.suggest(doc_type, 4096)
        );
    }
    assert_eq!(forward.suggest(DocumentType::Math, 1), "mathpix");
}

#[test]
fn file_names_drive_the_hint_not_the_choice() {
    let registry = EngineRegistry::builder()
        .register("mock", Arc::new(MockEngine::new()))
        .register("mathpix", mathpix())
        .build();
    assert_eq!(registry.suggest_for_file("handwritten-notes.pdf", 10), "mathpix");
    assert_eq!(registry.suggest_for_file("scan_001.pdf", 10), "mathpix");
}

#[test]
fn lookups_of_unknown_engines_list_what_exists() {
    let registry = EngineRegistry::builder()
        .register("mock", Arc::new(MockEngine::new()))
        .build();
    match registry.get("mathpix") {
        Err(Pdf2OcrError::EngineUnavailable { name, available }) => {
            assert_eq!(name, "mathpix");
            assert_eq!(available, "mock");
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("mathpix should not be registered"),
    }
    assert_eq!(registry.get("").unwrap().info().name, "mock");
}
