#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod gpu {
    use snowglobe::{
        Scene, SceneConfig,
        data_structures::texture::{PixelBuffer, TextureOptions},
        geometry::{GeometryConfig, VertexData},
        particles::ParticleConfig,
        shaders,
    };

    use crate::common::test_utils::{SIZE, close, headless, read_target, srgb_byte};

    /// A 2x2 quad in the x = 0 plane facing +X, the default camera's view axis.
    fn quad() -> GeometryConfig {
        #[rustfmt::skip]
        let data = vec![
            0.0, -1.0, -1.0,   1.0, 0.0, 0.0,   0.0, 1.0,
            0.0,  1.0, -1.0,   1.0, 0.0, 0.0,   1.0, 1.0,
            0.0,  1.0,  1.0,   1.0, 0.0, 0.0,   1.0, 0.0,
            0.0, -1.0, -1.0,   1.0, 0.0, 0.0,   0.0, 1.0,
            0.0,  1.0,  1.0,   1.0, 0.0, 0.0,   1.0, 0.0,
            0.0, -1.0,  1.0,   1.0, 0.0, 0.0,   0.0, 0.0,
        ];
        GeometryConfig {
            buffers: vec![
                VertexData::new(data)
                    .attribute("position", 3)
                    .attribute("normal", 3)
                    .attribute("uv", 2),
            ],
            ..GeometryConfig::default()
        }
    }

    #[test]
    fn empty_scene_renders_the_clear_colour() {
        let ctx = headless().unwrap();
        let target = ctx.create_target("target");
        let mut scene = Scene::new(SceneConfig::default());
        scene.render(&ctx, &target.view);

        let image = read_target(&ctx, &target).unwrap();
        let clear = scene.config().clear_colour;
        for pixel in [image.get_pixel(0, 0), image.get_pixel(SIZE / 2, SIZE - 1)] {
            assert!(close(pixel[0], srgb_byte(clear.r)), "{pixel:?}");
            assert!(close(pixel[1], srgb_byte(clear.g)), "{pixel:?}");
            assert!(close(pixel[2], srgb_byte(clear.b)), "{pixel:?}");
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn textured_quad_covers_the_view_centre() {
        let ctx = headless().unwrap();
        let target = ctx.create_target("target");
        let mut scene = Scene::new(SceneConfig::default());

        let program = scene.add_program(&ctx, &shaders::mesh()).unwrap();
        assert!(scene.follows_camera(program));
        let red = PixelBuffer::new(2, 2, 3, [255, 0, 0].repeat(4));
        let texture = scene
            .add_texture(&ctx, &red, &TextureOptions::default(), "red")
            .unwrap();
        scene.bind_texture(program, "diffuse", texture).unwrap();
        scene.add_geometry(&ctx, program, quad()).unwrap();
        scene.render(&ctx, &target.view);

        let image = read_target(&ctx, &target).unwrap();
        let centre = image.get_pixel(SIZE / 2, SIZE / 2);
        assert!(centre[0] > 100, "{centre:?}");
        assert!(centre[1] < 20 && centre[2] < 20, "{centre:?}");
        let corner = image.get_pixel(0, 0);
        assert!(close(corner[0], srgb_byte(scene.config().clear_colour.r)));
    }

    #[test]
    fn particles_add_light_over_the_background() {
        let ctx = headless().unwrap();
        let target = ctx.create_target("target");
        let mut scene = Scene::new(SceneConfig::default());

        let program = scene.add_program(&ctx, &shaders::particles()).unwrap();
        let config = ParticleConfig {
            count: 300,
            seed: Some(11),
            billboard_scale: 0.5,
            ..ParticleConfig::default()
        };
        let id = scene.add_particles(&ctx, program, config).unwrap();
        scene.update(&Default::default(), 0.016);
        scene.render(&ctx, &target.view);

        let eye = scene.camera().position();
        let pool = scene.particles(id).unwrap().pool();
        let distances: Vec<f32> = pool
            .particles()
            .iter()
            .map(|p| (p.position - eye).norm())
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        let image = read_target(&ctx, &target).unwrap();
        let saturated = image
            .pixels()
            .filter(|p| p[0] == 255 && p[1] == 255 && p[2] == 255)
            .count();
        assert!(saturated > 0);
    }
}
