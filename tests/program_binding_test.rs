use snowglobe::{
    math::{Matrix4, Vector4},
    program::{BindingError, ProgramInterface, ProgramSource, ShaderType},
};

const VERTEX: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
"#;

const FRAGMENT: &str = r#"
@group(0) @binding(0) var<uniform> color: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return color;
}
"#;

fn program() -> ProgramInterface {
    ProgramInterface::build(&ProgramSource::new("flat", VERTEX, FRAGMENT)).unwrap()
}

#[test]
fn color_uniform_accepts_only_vec4() {
    let mut program = program();
    assert_eq!(program.uniform("color").unwrap().ty, ShaderType::Vec4);

    let err = program
        .set_uniform("color", Matrix4::identity())
        .unwrap_err();
    assert!(matches!(
        err,
        BindingError::TypeMismatch {
            declared: ShaderType::Vec4,
            provided: ShaderType::Mat4,
            ..
        }
    ));

    program
        .set_uniform("color", Vector4::new(1.0, 0.5, 0.25, 1.0))
        .unwrap();
}

#[test]
fn unknown_uniform_names_are_ignored() {
    let mut program = program();
    program.set_uniform("does_not_exist", 1.0f32).unwrap();
    assert!(program.uniform("does_not_exist").is_none());
}

#[test]
fn broken_source_reports_the_compiler_log() {
    let err = ProgramInterface::build(&ProgramSource::new("broken", "fn vs_main( {", FRAGMENT))
        .unwrap_err();
    match err {
        BindingError::Compile { program, log, .. } => {
            assert_eq!(program, "broken");
            assert!(!log.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
}
